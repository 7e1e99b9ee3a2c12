//! Find-or-create/update of content items, keyed by (folder, display name).
//!
//! Every upsert re-queries the store rather than caching ids, so the store
//! stays the single source of truth for duplicate detection across repeated
//! imports.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::content::rewrite_table_markers;
use crate::error::{ImportError, Result};
use crate::model::{RollTableSpec, SceneMap, SceneSpec};
use crate::store::{
    AssetUploader, ContentKind, EmbeddedKind, EntityId, EntityStore, FLAG_SCOPE, SettingsProvider,
};

/// Settings key for the directory scene images are uploaded into.
pub const SETTING_UPLOAD_DIR: &str = "scene-upload-directory";
/// Settings key for the image-format preference (`"webp"` or `"original"`).
pub const SETTING_IMAGE_FORMAT: &str = "scene-image-format";

const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Update a journal entry's content in place, or create the entry if the
/// (folder, name) pair is new. Roll-table markers in `content` are rewritten
/// first, so tables referenced by the text must already exist.
pub async fn upsert_journal(
    store: &dyn EntityStore,
    folder: &EntityId,
    name: &str,
    content: &str,
) -> Result<EntityId> {
    let content = rewrite_table_markers(store, content).await?;

    match store
        .find_content(ContentKind::JournalEntry, folder, name)
        .await?
    {
        Some(id) => {
            debug!(journal = name, id = %id, "updating journal entry");
            store
                .update_content(&id, json!({ "content": content }))
                .await?;
            Ok(id)
        }
        None => {
            debug!(journal = name, "creating journal entry");
            Ok(store
                .create_content(
                    ContentKind::JournalEntry,
                    json!({
                        "folder": folder,
                        "name": name,
                        "content": content,
                        "img": Value::Null,
                    }),
                )
                .await?)
        }
    }
}

/// Create a roll table with its `1d<max>` formula and ordered result rows,
/// tagged with the external table id so journal markers can resolve it.
/// There is no update path: an existing (folder, name) table is returned
/// untouched, result rows and all.
pub async fn upsert_table(
    store: &dyn EntityStore,
    folder: &EntityId,
    table: &RollTableSpec,
) -> Result<EntityId> {
    if let Some(id) = store
        .find_content(ContentKind::RollTable, folder, &table.name)
        .await?
    {
        debug!(table = table.name.as_str(), id = %id, "roll table exists, keeping as is");
        return Ok(id);
    }
    debug!(table = table.name.as_str(), source_id = table.id.as_str(), "creating roll table");
    let id = store
        .create_content(
            ContentKind::RollTable,
            json!({
                "name": table.name,
                "formula": format!("1d{}", table.max),
                "folder": folder,
                "flags": { FLAG_SCOPE: { "tableId": table.id } },
            }),
        )
        .await?;
    if !table.results.is_empty() {
        store
            .create_embedded(&id, EmbeddedKind::TableResult, table.results.clone())
            .await?;
    }
    Ok(id)
}

/// Update a scene's geometry and replace its walls/lights, or create it with
/// freshly uploaded map images. Returns `None` when the scene declares no map:
/// such a scene only contributes journal sub-entries, never a host scene.
pub async fn upsert_scene(
    store: &dyn EntityStore,
    uploader: &dyn AssetUploader,
    settings: &dyn SettingsProvider,
    folder: &EntityId,
    scene: &SceneSpec,
) -> Result<Option<EntityId>> {
    let Some(map) = scene.map.as_ref() else {
        debug!(scene = scene.name.as_str(), "scene has no map, skipping");
        return Ok(None);
    };

    let id = match store
        .find_content(ContentKind::Scene, folder, &scene.name)
        .await?
    {
        Some(id) => {
            debug!(scene = scene.name.as_str(), id = %id, "scene exists, updating");
            update_scene(store, &id, scene, map).await?;
            id
        }
        None => {
            debug!(scene = scene.name.as_str(), "creating scene");
            create_scene(store, uploader, settings, folder, scene, map).await?
        }
    };
    Ok(Some(id))
}

async fn update_scene(
    store: &dyn EntityStore,
    id: &EntityId,
    scene: &SceneSpec,
    map: &SceneMap,
) -> Result<()> {
    let mut update = Map::new();
    update.insert("width".into(), map.width.into());
    update.insert("height".into(), map.height.into());
    update.insert("backgroundColor".into(), map.background_color.clone().into());
    optional_geometry(map, &mut update);
    store.update_content(id, Value::Object(update)).await?;

    // full replace of sub-resources, not a merge
    replace_embedded(store, id, EmbeddedKind::Wall, &scene.walls).await?;
    replace_embedded(store, id, EmbeddedKind::AmbientLight, &scene.lights).await?;
    Ok(())
}

async fn create_scene(
    store: &dyn EntityStore,
    uploader: &dyn AssetUploader,
    settings: &dyn SettingsProvider,
    folder: &EntityId,
    scene: &SceneSpec,
    map: &SceneMap,
) -> Result<EntityId> {
    let dir = settings
        .get(FLAG_SCOPE, SETTING_UPLOAD_DIR)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string());
    let keep_extension = settings
        .get(FLAG_SCOPE, SETTING_IMAGE_FORMAT)
        .and_then(|v| v.as_str().map(str::to_string))
        .is_some_and(|f| f == "original");

    let player_src = upload_asset(
        uploader,
        &scene.name,
        &map.player_src,
        &dir,
        &upload_name(&map.player_local),
        keep_extension,
    )
    .await?;

    let gm_src = match (map.gm_src.as_deref(), map.gm_local.as_deref()) {
        (Some(src), Some(local)) => Some(
            upload_asset(uploader, &scene.name, src, &dir, &upload_name(local), keep_extension)
                .await?,
        ),
        _ => None,
    };

    // thumbnails always use the host's preferred web format
    let thumb = upload_asset(
        uploader,
        &scene.name,
        &map.thumb,
        &dir,
        &upload_name(&map.thumb),
        false,
    )
    .await?;

    let mut flags = Map::new();
    // original dimensions and thumbnail, recoverable after later edits
    flags.insert("width".into(), map.width.into());
    flags.insert("height".into(), map.height.into());
    flags.insert("thumb".into(), map.thumb.clone().into());
    if let Some(gm) = &gm_src {
        // both maps uploaded: record the pair for GM/player map switching
        flags.insert(
            "alt".into(),
            json!({ "GM": gm, "Player": player_src }),
        );
    }

    let mut attrs = Map::new();
    attrs.insert("name".into(), scene.name.clone().into());
    attrs.insert("img".into(), player_src.into());
    attrs.insert("thumb".into(), thumb.into());
    attrs.insert("folder".into(), json!(folder));
    attrs.insert("width".into(), map.width.into());
    attrs.insert("height".into(), map.height.into());
    attrs.insert("backgroundColor".into(), map.background_color.clone().into());
    attrs.insert("globalLight".into(), map.global_light.unwrap_or(true).into());
    attrs.insert("navigation".into(), false.into());
    attrs.insert("flags".into(), json!({ FLAG_SCOPE: Value::Object(flags) }));
    optional_geometry(map, &mut attrs);

    let id = store.create_content(ContentKind::Scene, Value::Object(attrs)).await?;

    if !scene.walls.is_empty() {
        store
            .create_embedded(&id, EmbeddedKind::Wall, scene.walls.clone())
            .await?;
    }
    if !scene.lights.is_empty() {
        store
            .create_embedded(&id, EmbeddedKind::AmbientLight, scene.lights.clone())
            .await?;
    }
    Ok(id)
}

/// Upload one image, pinning failures on the scene whose batch they abort.
async fn upload_asset(
    uploader: &dyn AssetUploader,
    scene_name: &str,
    source: &str,
    dir: &str,
    target_name: &str,
    keep_extension: bool,
) -> Result<String> {
    uploader
        .upload(source, dir, target_name, keep_extension)
        .await
        .map_err(|e| ImportError::Upload {
            scene: scene_name.to_string(),
            source: e,
        })
}

/// Absent optional fields are omitted from the payload entirely.
fn optional_geometry(map: &SceneMap, attrs: &mut Map<String, Value>) {
    if let Some(v) = map.shift_x {
        attrs.insert("shiftX".into(), v.into());
    }
    if let Some(v) = map.shift_y {
        attrs.insert("shiftY".into(), v.into());
    }
    if let Some(v) = map.grid {
        attrs.insert("grid".into(), v.into());
    }
    if let Some(v) = map.grid_distance {
        attrs.insert("gridDistance".into(), v.into());
    }
    if let Some(v) = map.grid_type {
        attrs.insert("gridType".into(), v.into());
    }
    if let Some(v) = map.global_light {
        attrs.insert("globalLight".into(), v.into());
    }
}

async fn replace_embedded(
    store: &dyn EntityStore,
    parent: &EntityId,
    kind: EmbeddedKind,
    specs: &[Value],
) -> Result<()> {
    if specs.is_empty() {
        return Ok(());
    }
    let existing: Vec<EntityId> = store
        .embedded(parent, kind)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if !existing.is_empty() {
        store.delete_embedded(parent, kind, existing).await?;
    }
    store.create_embedded(parent, kind, specs.to_vec()).await?;
    Ok(())
}

/// Flatten an asset's local path into an upload file name, dropping the webp
/// suffix so the uploader controls the stored extension.
fn upload_name(local: &str) -> String {
    let flat = local.replace('/', "-");
    flat.strip_suffix(".webp").unwrap_or(&flat).to_string()
}
