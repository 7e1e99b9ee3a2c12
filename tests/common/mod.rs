//! In-memory host doubles for the importer's capability traits.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use adventure_importer::{
    AssetUploader, Book, ContentKind, Embedded, EmbeddedKind, EntityId, EntityStore, FolderKey,
    SceneSpec, SettingsProvider, SourceBook, SubEntry, TableRef,
};

#[derive(Debug, Clone)]
pub struct FolderRec {
    pub id: EntityId,
    pub parent: Option<EntityId>,
    pub kind: ContentKind,
    pub name: String,
    pub source: String,
    pub attrs: Value,
}

#[derive(Debug, Clone)]
pub struct ContentRec {
    pub id: EntityId,
    pub kind: ContentKind,
    pub attrs: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRec {
    pub source: String,
    pub directory: String,
    pub target_name: String,
    pub keep_extension: bool,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    folders: Vec<FolderRec>,
    content: Vec<ContentRec>,
    embedded: HashMap<(String, EmbeddedKind), Vec<Embedded>>,
    uploads: Vec<UploadRec>,
    fail_uploads: bool,
}

/// One fake host playing entity store, asset uploader and settings provider.
#[derive(Default)]
pub struct MemoryHost {
    inner: Mutex<Inner>,
    settings: HashMap<(String, String), Value>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_setting(mut self, namespace: &str, key: &str, value: Value) -> Self {
        self.settings
            .insert((namespace.to_string(), key.to_string()), value);
        self
    }

    pub fn fail_uploads(&self) {
        self.inner.lock().unwrap().fail_uploads = true;
    }

    fn mint(inner: &mut Inner) -> EntityId {
        inner.next_id += 1;
        EntityId::new(format!("e{}", inner.next_id))
    }

    // --- assertion helpers -------------------------------------------------

    pub fn folder_count(&self) -> usize {
        self.inner.lock().unwrap().folders.len()
    }

    pub fn folders(&self) -> Vec<FolderRec> {
        self.inner.lock().unwrap().folders.clone()
    }

    pub fn content_count(&self, kind: ContentKind) -> usize {
        self.inner
            .lock()
            .unwrap()
            .content
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    pub fn content_named(&self, kind: ContentKind, name: &str) -> Option<ContentRec> {
        self.inner
            .lock()
            .unwrap()
            .content
            .iter()
            .find(|c| c.kind == kind && c.attrs.get("name").and_then(Value::as_str) == Some(name))
            .cloned()
    }

    pub fn content_attrs(&self, id: &EntityId) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .content
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.attrs.clone())
    }

    /// Display names of all items of `kind` inside `folder`, in creation order.
    pub fn names_in_folder(&self, kind: ContentKind, folder: &EntityId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .content
            .iter()
            .filter(|c| {
                c.kind == kind
                    && c.attrs.get("folder").and_then(Value::as_str) == Some(folder.as_str())
            })
            .filter_map(|c| c.attrs.get("name").and_then(Value::as_str).map(String::from))
            .collect()
    }

    pub fn embedded_of(&self, parent: &EntityId, kind: EmbeddedKind) -> Vec<Embedded> {
        self.inner
            .lock()
            .unwrap()
            .embedded
            .get(&(parent.as_str().to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }

    pub fn uploads(&self) -> Vec<UploadRec> {
        self.inner.lock().unwrap().uploads.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryHost {
    async fn find_folder(&self, key: &FolderKey) -> Result<Option<EntityId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .folders
            .iter()
            .find(|f| {
                f.parent == key.parent
                    && f.kind == key.kind
                    && f.name == key.name
                    && f.source == key.source
            })
            .map(|f| f.id.clone()))
    }

    async fn create_folder(&self, key: &FolderKey, attrs: Value) -> Result<EntityId> {
        let mut inner = self.inner.lock().unwrap();
        let id = Self::mint(&mut inner);
        inner.folders.push(FolderRec {
            id: id.clone(),
            parent: key.parent.clone(),
            kind: key.kind,
            name: key.name.clone(),
            source: key.source.clone(),
            attrs,
        });
        Ok(id)
    }

    async fn find_content(
        &self,
        kind: ContentKind,
        folder: &EntityId,
        name: &str,
    ) -> Result<Option<EntityId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .content
            .iter()
            .find(|c| {
                c.kind == kind
                    && c.attrs.get("folder").and_then(Value::as_str) == Some(folder.as_str())
                    && c.attrs.get("name").and_then(Value::as_str) == Some(name)
            })
            .map(|c| c.id.clone()))
    }

    async fn find_table_by_source(&self, source_id: &str) -> Result<Option<TableRef>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .content
            .iter()
            .find(|c| {
                c.kind == ContentKind::RollTable
                    && c.attrs
                        .pointer("/flags/adventure-importer/tableId")
                        .and_then(Value::as_str)
                        == Some(source_id)
            })
            .map(|c| TableRef {
                id: c.id.clone(),
                name: c
                    .attrs
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }))
    }

    async fn create_content(&self, kind: ContentKind, attrs: Value) -> Result<EntityId> {
        let mut inner = self.inner.lock().unwrap();
        let id = Self::mint(&mut inner);
        inner.content.push(ContentRec {
            id: id.clone(),
            kind,
            attrs,
        });
        Ok(id)
    }

    async fn update_content(&self, id: &EntityId, attrs: Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let rec = inner
            .content
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| anyhow!("no such entity: {id}"))?;
        if let (Some(existing), Value::Object(new)) = (rec.attrs.as_object_mut(), attrs) {
            for (k, v) in new {
                existing.insert(k, v);
            }
        }
        Ok(())
    }

    async fn embedded(&self, parent: &EntityId, kind: EmbeddedKind) -> Result<Vec<Embedded>> {
        Ok(self.embedded_of(parent, kind))
    }

    async fn create_embedded(
        &self,
        parent: &EntityId,
        kind: EmbeddedKind,
        specs: Vec<Value>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let mut rows = Vec::new();
        for data in specs {
            let id = Self::mint(&mut inner);
            rows.push(Embedded { id, data });
        }
        inner
            .embedded
            .entry((parent.as_str().to_string(), kind))
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn delete_embedded(
        &self,
        parent: &EntityId,
        kind: EmbeddedKind,
        ids: Vec<EntityId>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(rows) = inner
            .embedded
            .get_mut(&(parent.as_str().to_string(), kind))
        {
            rows.retain(|r| !ids.contains(&r.id));
        }
        Ok(())
    }
}

#[async_trait]
impl AssetUploader for MemoryHost {
    async fn upload(
        &self,
        source: &str,
        directory: &str,
        target_name: &str,
        keep_extension: bool,
    ) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_uploads {
            return Err(anyhow!("upload rejected: {source}"));
        }
        inner.uploads.push(UploadRec {
            source: source.to_string(),
            directory: directory.to_string(),
            target_name: target_name.to_string(),
            keep_extension,
        });
        let ext = if keep_extension {
            source.rsplit('.').next().unwrap_or("webp")
        } else {
            "webp"
        };
        Ok(format!("hosted/{directory}/{target_name}.{ext}"))
    }
}

impl SettingsProvider for MemoryHost {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.settings
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }
}

// --- fixtures --------------------------------------------------------------

pub fn sample_book() -> Book {
    Book {
        title: "Intro".to_string(),
        book: SourceBook {
            name: "Player's Handbook".to_string(),
            abbrev: "PHB".to_string(),
        },
        content: "Hello".to_string(),
        scenes: vec![mapped_scene("S1")],
        roll_tables: Vec::new(),
    }
}

pub fn mapped_scene(name: &str) -> SceneSpec {
    serde_json::from_value(json!({
        "name": name,
        "map": {
            "width": 4000,
            "height": 3000,
            "backgroundColor": "#000000",
            "playerSrc": "https://assets.test/maps/player.webp",
            "playerLocal": "maps/player.webp",
            "thumb": "thumbs/player.webp",
            "grid": 70
        },
        "walls": [{ "c": [0, 0, 100, 0] }],
        "lights": [{ "x": 10, "y": 20, "dim": 30 }],
        "entries": [
            { "name": "E1", "content": "c1", "position": { "x": 100.0, "y": 200.0 } },
            { "name": "E2", "content": "c2" }
        ]
    }))
    .expect("scene fixture")
}

pub fn entry(name: &str, content: &str) -> SubEntry {
    SubEntry {
        name: name.to_string(),
        content: content.to_string(),
        position: None,
    }
}
