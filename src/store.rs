//! Host collaborator capabilities.
//!
//! The importer never talks to the host application directly; everything it
//! needs is injected through the traits below. The host owns entity identity,
//! persistence and permissions — this crate only issues lookups, creates and
//! updates against whatever implements [`EntityStore`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Flag scope under which this importer stores its metadata on host entities
/// (source-book tags on folders, external table ids on roll tables, the
/// import-origin marker on scene notes).
pub const FLAG_SCOPE: &str = "adventure-importer";

/// Opaque host-side identifier. Store implementations mint these; the
/// importer only passes them back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of top-level content an item (or the folder holding it) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    JournalEntry,
    Scene,
    RollTable,
}

/// Sub-resources embedded in a top-level entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddedKind {
    Wall,
    AmbientLight,
    TableResult,
    Note,
}

/// Composite folder identity: all four parts must match on lookup.
///
/// `parent` is `None` at the root. `source` is the disambiguating source-book
/// tag (lowercased book abbreviation) that keeps same-named folders from
/// different books apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderKey {
    pub parent: Option<EntityId>,
    pub kind: ContentKind,
    pub name: String,
    pub source: String,
}

/// A roll table resolved by its external id, as needed for link rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub id: EntityId,
    pub name: String,
}

/// One embedded sub-resource record as stored by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    pub id: EntityId,
    pub data: Value,
}

/// Entity-management capability of the host.
///
/// Lookups match on the full composite key and return the first match in
/// host iteration order; duplicate tolerance is the host's business.
/// Attribute payloads are opaque JSON the host interprets against its own
/// schema.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_folder(&self, key: &FolderKey) -> Result<Option<EntityId>>;

    /// Create a folder under `key.parent`, carrying the key's name, kind and
    /// source tag. `attrs` holds presentation extras (folder color).
    async fn create_folder(&self, key: &FolderKey, attrs: Value) -> Result<EntityId>;

    /// Find a content item by (kind, containing folder, display name).
    async fn find_content(
        &self,
        kind: ContentKind,
        folder: &EntityId,
        name: &str,
    ) -> Result<Option<EntityId>>;

    /// Find a roll table by the external table id it was tagged with at
    /// creation (under [`FLAG_SCOPE`]).
    async fn find_table_by_source(&self, source_id: &str) -> Result<Option<TableRef>>;

    async fn create_content(&self, kind: ContentKind, attrs: Value) -> Result<EntityId>;

    async fn update_content(&self, id: &EntityId, attrs: Value) -> Result<()>;

    async fn embedded(&self, parent: &EntityId, kind: EmbeddedKind) -> Result<Vec<Embedded>>;

    async fn create_embedded(
        &self,
        parent: &EntityId,
        kind: EmbeddedKind,
        specs: Vec<Value>,
    ) -> Result<()>;

    async fn delete_embedded(
        &self,
        parent: &EntityId,
        kind: EmbeddedKind,
        ids: Vec<EntityId>,
    ) -> Result<()>;
}

/// Uploads an image asset into host-managed storage and returns the URL the
/// host will serve it under.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// `keep_extension` requests the source file's own format instead of the
    /// host's preferred web format.
    async fn upload(
        &self,
        source: &str,
        directory: &str,
        target_name: &str,
        keep_extension: bool,
    ) -> Result<String>;
}

/// Read access to host-side module settings.
pub trait SettingsProvider: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;
}
