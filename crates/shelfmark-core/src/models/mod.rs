//! Data models for Shelfmark

mod collection;
mod field_timestamps;
mod library;
mod paper;
mod saved_search;
mod sync_conflict;
mod tag;

pub use collection::{Collection, CollectionId};
pub use field_timestamps::FieldTimestamps;
pub use library::{Library, LibraryId};
pub use paper::{FieldValue, Paper, PaperId, ScalarField};
pub use saved_search::{SavedSearch, SavedSearchId};
pub use sync_conflict::SyncConflict;
pub use tag::{Tag, TagId};
