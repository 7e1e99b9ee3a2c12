//! Folder-chain resolution.
//!
//! Folders are identified by the composite key (parent, kind, name, source
//! tag). Resolution walks the requested path left to right, creating any
//! missing link, and returns the leaf folder's id. Nothing is ever deleted.

use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::store::{ContentKind, EntityId, EntityStore, FolderKey};

/// Color applied to folders this importer creates.
pub const FOLDER_BASE_COLOR: &str = "#98020a";

/// Resolve or create the folder chain `segments` for the given source-book
/// tag and content kind, returning the leaf folder's id.
///
/// An empty `segments` resolves to the root (`None`). Calling this twice with
/// the same arguments returns the same id: each step looks the folder up by
/// its full composite key before creating it.
pub async fn resolve_folder(
    store: &dyn EntityStore,
    segments: &[&str],
    source: &str,
    kind: ContentKind,
) -> Result<Option<EntityId>> {
    let source = source.to_ascii_lowercase();
    let mut parent: Option<EntityId> = None;

    for name in segments {
        let key = FolderKey {
            parent: parent.clone(),
            kind,
            name: (*name).to_string(),
            source: source.clone(),
        };
        let id = match store.find_folder(&key).await? {
            Some(id) => id,
            None => {
                debug!(folder = *name, kind = ?kind, "creating folder");
                store
                    .create_folder(&key, json!({ "color": FOLDER_BASE_COLOR }))
                    .await?
            }
        };
        parent = Some(id);
    }

    Ok(parent)
}
