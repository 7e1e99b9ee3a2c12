//! adventure_importer — idempotent import of adventure content into a host
//! application's data model.
//!
//! This crate takes a book descriptor (title, journal text, scenes with maps
//! and sub-entries, roll tables) and drives a host-provided entity store to
//! create the matching folders, journal entries, scenes and tables, updating
//! them in place on re-import instead of duplicating them. The host owns
//! identity and persistence; it is plugged in through the capability traits
//! in [`store`].
//!
//! Entry point: build an [`Importer`] over the host capabilities and call
//! [`Importer::import_book`] (or [`Importer::import_page`] for the raw
//! `{ "data": ... }` envelope).

pub mod content;
pub mod error;
pub mod folders;
pub mod import;
pub mod model;
pub mod store;
pub mod upsert;

pub use crate::error::*;
pub use crate::folders::resolve_folder;
pub use crate::import::{ImportSummary, Importer};
pub use crate::model::*;
pub use crate::store::*;
pub use crate::upsert::{upsert_journal, upsert_scene, upsert_table};
