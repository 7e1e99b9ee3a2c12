//! Import orchestration.
//!
//! One call to [`Importer::import_book`] is one import transaction. The
//! dependency order is fixed: roll tables first (journal text links them),
//! then folders and scenes, then journal entries, and scene notes only once
//! both their scene and their entry exist. Independent items of one kind run
//! concurrently; a single failure aborts the whole batch and surfaces as one
//! consolidated error.

use futures::future::try_join_all;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, error};

use crate::error::{ImportError, Result};
use crate::folders::resolve_folder;
use crate::model::{Book, SceneSpec};
use crate::store::{
    AssetUploader, ContentKind, EmbeddedKind, EntityId, EntityStore, FLAG_SCOPE, SettingsProvider,
};
use crate::upsert::{upsert_journal, upsert_scene, upsert_table};

/// Directory the per-entry note icons are served from.
const NOTE_ICON_DIR: &str = "icons";

/// Host ids of everything one import touched, by kind.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub tables: Vec<EntityId>,
    pub scenes: Vec<EntityId>,
    pub journals: Vec<EntityId>,
}

/// The importer with its injected host capabilities.
pub struct Importer<'a> {
    store: &'a dyn EntityStore,
    uploader: &'a dyn AssetUploader,
    settings: &'a dyn SettingsProvider,
}

impl<'a> Importer<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        uploader: &'a dyn AssetUploader,
        settings: &'a dyn SettingsProvider,
    ) -> Self {
        Importer {
            store,
            uploader,
            settings,
        }
    }

    /// Host-facing entry point: unwrap the `{ "data": ... }` envelope and
    /// import the book. The single place errors are logged before they
    /// propagate to the caller.
    pub async fn import_page(&self, body: &Value) -> Result<ImportSummary> {
        let result = match Book::from_envelope(body) {
            Ok(book) => self.import_book(&book).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(error = %e, "page import failed");
        }
        result
    }

    /// Import one book: tables, scenes, journal entries and notes, in
    /// dependency order. Re-running with identical input updates in place
    /// and never duplicates folders, content or notes.
    pub async fn import_book(&self, book: &Book) -> Result<ImportSummary> {
        debug!(title = book.title.as_str(), source = book.book.abbrev.as_str(), "importing book");

        let tables = self.import_tables(book).await?;
        let scenes_by_name = self.import_scenes(book).await?;
        let journals = self.import_journals(book, &scenes_by_name).await?;

        // scene ids in declared order
        let scenes = book
            .scenes
            .iter()
            .filter_map(|s| scenes_by_name.get(&s.name).cloned())
            .collect();

        Ok(ImportSummary {
            tables,
            scenes,
            journals,
        })
    }

    /// Tables go first so their stable ids exist before journal text is
    /// rewritten. Independent of each other, so the batch runs concurrently.
    async fn import_tables(&self, book: &Book) -> Result<Vec<EntityId>> {
        if book.roll_tables.is_empty() {
            return Ok(Vec::new());
        }
        let folder = leaf(
            resolve_folder(
                self.store,
                &[book.title.as_str()],
                &book.book.abbrev,
                ContentKind::RollTable,
            )
            .await?,
        )?;
        try_join_all(
            book.roll_tables
                .iter()
                .map(|t| upsert_table(self.store, &folder, t)),
        )
        .await
    }

    /// Upsert all scenes concurrently (each addresses a distinct
    /// folder+name). Scenes without a map are skipped and absent from the
    /// returned name-to-id map.
    async fn import_scenes(&self, book: &Book) -> Result<HashMap<String, EntityId>> {
        let folder = leaf(
            resolve_folder(
                self.store,
                &[book.book.name.as_str(), book.title.as_str()],
                &book.book.abbrev,
                ContentKind::Scene,
            )
            .await?,
        )?;
        let ids = try_join_all(book.scenes.iter().map(|scene| {
            upsert_scene(self.store, self.uploader, self.settings, &folder, scene)
        }))
        .await?;

        Ok(book
            .scenes
            .iter()
            .zip(ids)
            .filter_map(|(scene, id)| id.map(|id| (scene.name.clone(), id)))
            .collect())
    }

    /// The top-level journal entry, then each scene's sub-entries in declared
    /// order, then the scene notes pointing at them.
    async fn import_journals(
        &self,
        book: &Book,
        scenes: &HashMap<String, EntityId>,
    ) -> Result<Vec<EntityId>> {
        let source = &book.book.abbrev;
        let title = book.title.as_str();

        // folders for all journal content exist before any entry is written
        let top_folder = leaf(
            resolve_folder(self.store, &[title], source, ContentKind::JournalEntry).await?,
        )?;
        try_join_all(book.scenes.iter().map(|scene| async move {
            let segments = [title, scene.name.as_str()];
            resolve_folder(self.store, &segments, source, ContentKind::JournalEntry).await
        }))
        .await?;

        let mut journals = Vec::new();
        journals.push(upsert_journal(self.store, &top_folder, title, &book.content).await?);

        for scene in &book.scenes {
            let scene_id = scenes.get(&scene.name);
            if let Some(id) = scene_id {
                self.remove_imported_notes(id).await?;
            }
            let entries = self.import_scene_entries(book, scene, scene_id).await?;
            journals.extend(entries);
        }
        Ok(journals)
    }

    /// Sub-entries run sequentially: their names carry a two-digit sequence
    /// prefix derived from declared order, a stable sort key the host's own
    /// ordering cannot disturb.
    async fn import_scene_entries(
        &self,
        book: &Book,
        scene: &SceneSpec,
        scene_id: Option<&EntityId>,
    ) -> Result<Vec<EntityId>> {
        let folder = leaf(
            resolve_folder(
                self.store,
                &[book.title.as_str(), scene.name.as_str()],
                &book.book.abbrev,
                ContentKind::JournalEntry,
            )
            .await?,
        )?;

        let mut journals = Vec::new();
        let mut notes: Vec<Value> = Vec::new();
        for (index, entry) in scene.entries.iter().enumerate() {
            let prefix = format!("{:02}", index + 1);
            let name = format!("{prefix} {}", entry.name);
            let journal = upsert_journal(self.store, &folder, &name, &entry.content).await?;

            // entries without a position get no note, silently
            if let (Some(_), Some(position)) = (scene_id, entry.position) {
                let mut note = json!({
                    "entryId": journal,
                    "flags": { FLAG_SCOPE: true },
                    "icon": format!("{NOTE_ICON_DIR}/{prefix}.svg"),
                    "x": position.x,
                    "y": position.y,
                });
                if let Some(grid) = scene.map.as_ref().and_then(|m| m.grid) {
                    note["iconSize"] = grid.into();
                }
                notes.push(note);
            }
            journals.push(journal);
        }

        if let Some(id) = scene_id {
            if !notes.is_empty() {
                debug!(scene = scene.name.as_str(), count = notes.len(), "placing notes");
                self.store
                    .create_embedded(id, EmbeddedKind::Note, notes)
                    .await?;
            }
        }
        Ok(journals)
    }

    /// Delete every note this importer placed on the scene in earlier runs,
    /// identified by the import-origin flag. Notes from other sources stay.
    async fn remove_imported_notes(&self, scene_id: &EntityId) -> Result<()> {
        let tagged: Vec<EntityId> = self
            .store
            .embedded(scene_id, EmbeddedKind::Note)
            .await?
            .into_iter()
            .filter(|note| {
                note.data
                    .get("flags")
                    .and_then(|f| f.get(FLAG_SCOPE))
                    .is_some_and(|v| v.as_bool().unwrap_or(!v.is_null()))
            })
            .map(|note| note.id)
            .collect();
        if !tagged.is_empty() {
            self.store
                .delete_embedded(scene_id, EmbeddedKind::Note, tagged)
                .await?;
        }
        Ok(())
    }
}

fn leaf(folder: Option<EntityId>) -> Result<EntityId> {
    folder.ok_or_else(|| ImportError::Unexpected("folder path resolved to root".into()))
}
