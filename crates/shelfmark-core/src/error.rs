//! Error types for shelfmark-core

use thiserror::Error;

/// Result type alias using shelfmark-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shelfmark-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote transport error during sync
    #[error("Sync error: {0}")]
    Sync(String),
}
