use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;

use crate::error::Result;

/// One imported book: free-text content plus the scenes and roll tables it
/// declares. This is the shape the host hands to the importer, wrapped in a
/// `{ "data": ... }` envelope (see [`Book::from_envelope`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub title: String,
    pub book: SourceBook,
    pub content: String,
    #[serde(default)]
    pub scenes: Vec<SceneSpec>,
    #[serde(default)]
    pub roll_tables: Vec<RollTableSpec>,
}

/// Source book the content came from. `abbrev` is the disambiguating tag
/// stored on every folder this import creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBook {
    pub name: String,
    pub abbrev: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSpec {
    pub name: String,
    /// Journal sub-entries in declared order; the orchestrator derives the
    /// `01 `/`02 ` name prefixes from this order.
    #[serde(default)]
    pub entries: Vec<SubEntry>,
    /// Map geometry and assets. A scene without a map is not created in the
    /// host; only its journal sub-entries are imported.
    #[serde(default)]
    pub map: Option<SceneMap>,
    /// Wall segments, passed through to the host untouched.
    #[serde(default)]
    pub walls: Vec<Value>,
    /// Ambient lights, passed through to the host untouched.
    #[serde(default)]
    pub lights: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneMap {
    pub width: i64,
    pub height: i64,
    pub background_color: String,
    /// Player map image source (URL or path).
    pub player_src: String,
    /// Local file name the player map is uploaded under.
    pub player_local: String,
    #[serde(default)]
    pub gm_src: Option<String>,
    #[serde(default)]
    pub gm_local: Option<String>,
    /// Thumbnail image source.
    pub thumb: String,
    #[serde(default)]
    pub shift_x: Option<i64>,
    #[serde(default)]
    pub shift_y: Option<i64>,
    #[serde(default)]
    pub grid: Option<i64>,
    #[serde(default)]
    pub grid_distance: Option<f64>,
    #[serde(default)]
    pub grid_type: Option<i64>,
    #[serde(default)]
    pub global_light: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEntry {
    pub name: String,
    pub content: String,
    /// Where the entry's note is pinned on the scene. Entries without a
    /// position get a journal entry but no note, and a position missing
    /// either coordinate counts as no position at all.
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: Option<Position>,
}

/// Accept only a complete `{x, y}` pair; anything partial or malformed
/// becomes `None` so one sloppy entry cannot abort the whole book.
fn lenient_position<'de, D>(deserializer: D) -> std::result::Result<Option<Position>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.and_then(|v| serde_json::from_value::<Position>(v).ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollTableSpec {
    /// External table identifier, referenced from journal content markers.
    pub id: String,
    pub name: String,
    /// Largest die face; the table formula becomes `1d<max>`.
    pub max: u32,
    /// Result rows in rolled order, passed through to the host untouched.
    #[serde(default)]
    pub results: Vec<Value>,
}

impl Book {
    /// Deserialize a book from the host's `{ "data": ... }` envelope.
    pub fn from_envelope(body: &Value) -> Result<Self> {
        let data = body.get("data").unwrap_or(body);
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn from_reader<R: Read>(mut r: R) -> Result<Self> {
        let mut s = String::new();
        r.read_to_string(&mut s)?;
        let v: Value = serde_json::from_str(&s)?;
        Self::from_envelope(&v)
    }
}
