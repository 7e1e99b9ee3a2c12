//! Journal-content preprocessing.
//!
//! Imported journal text embeds roll-table markers of the form
//! `<div data-type="rolltable" data-id="X">…</div>`. Before a journal entry
//! is written, each marker is rewritten into a resolved `@RollTable[id]{name}`
//! link block. Repeated markers for the same table id within one document are
//! stripped rather than relinked, so a document links each table at most once.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

use crate::error::Result;
use crate::store::{EntityStore, TableRef};

// Markers do not nest, so the non-greedy close is safe.
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\b[^>]*\bdata-type="rolltable"[^>]*>.*?</div>"#).expect("marker regex")
});

static DATA_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bdata-id="([^"]*)""#).expect("data-id regex"));

/// Rewrite all roll-table markers in `content` into resolved links.
///
/// Marker ids are resolved through the store's external-id index, which is
/// why roll tables must be upserted before any journal content is written.
/// A marker whose id resolves to nothing is left in place and logged.
pub async fn rewrite_table_markers(store: &dyn EntityStore, content: &str) -> Result<String> {
    let ids = collect_marker_ids(content);
    if ids.is_empty() {
        return Ok(content.to_string());
    }

    let mut tables: HashMap<String, Option<TableRef>> = HashMap::new();
    for id in ids {
        let found = store.find_table_by_source(&id).await?;
        if found.is_none() {
            warn!(table_id = %id, "roll-table marker does not resolve, leaving it untouched");
        }
        tables.insert(id, found);
    }

    Ok(apply_rewrite(content, &tables))
}

/// Distinct marker ids in order of first appearance.
fn collect_marker_ids(content: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for m in MARKER.find_iter(content) {
        if let Some(id) = marker_id(m.as_str()) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

/// The `data-id` attribute of a marker's opening tag, if any.
fn marker_id(marker: &str) -> Option<&str> {
    let open_tag = &marker[..marker.find('>').map(|i| i + 1).unwrap_or(marker.len())];
    DATA_ID
        .captures(open_tag)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn apply_rewrite(content: &str, tables: &HashMap<String, Option<TableRef>>) -> String {
    let mut linked: Vec<String> = Vec::new();
    MARKER
        .replace_all(content, |caps: &Captures| {
            let marker = caps.get(0).map_or("", |m| m.as_str());
            let Some(id) = marker_id(marker) else {
                return marker.to_string();
            };
            if linked.iter().any(|seen| seen == id) {
                // second and later occurrences are stripped, not relinked
                return String::new();
            }
            match tables.get(id).and_then(|t| t.as_ref()) {
                Some(table) => {
                    linked.push(id.to_string());
                    format!(
                        "<div class=\"rolltable\"><span class=\"rolltable-head\">Roll Table: \
                         </span><span class=\"rolltable-link\">@RollTable[{}]{{{}}}</span></div>",
                        table.id, table.name
                    )
                }
                None => marker.to_string(),
            }
        })
        .into_owned()
}
