//! Long-lived services shared across Shelfmark interfaces.

mod database;

pub use database::DatabaseService;
