//! Database layer for Shelfmark

mod connection;
mod library_repository;
mod migrations;
mod paper_repository;

pub use connection::{Database, SyncConfig};
pub use library_repository::{LibSqlLibraryRepository, LibraryRepository, MigrationCounts};
pub use paper_repository::{LibSqlPaperRepository, PaperRepository};
