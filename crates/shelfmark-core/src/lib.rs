//! shelfmark-core - Core library for Shelfmark
//!
//! This crate contains the shared models, persistence layer, and the
//! sync-conflict-resolution logic (field-level merge, identity conflict
//! detection, library and paper deduplication, sync orchestration) used
//! by all Shelfmark interfaces.

pub mod db;
pub mod dedup;
pub mod error;
pub mod events;
pub mod merge;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Library, LibraryId, Paper, PaperId};
