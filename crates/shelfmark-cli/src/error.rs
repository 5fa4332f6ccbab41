use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shelfmark_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Citekey cannot be empty")]
    EmptyCitekey,
    #[error("Paper ID cannot be empty")]
    EmptyPaperId,
    #[error("Library name cannot be empty")]
    EmptyLibraryName,
    #[error("Paper not found for id/citekey: {0}")]
    PaperNotFound(String),
    #[error("Library not found: {0}")]
    LibraryNotFound(String),
    #[error("Citekey '{0}' is already in use")]
    CitekeyTaken(String),
    #[error("A paper with this DOI or arXiv id already exists: {0}")]
    DuplicatePaper(String),
    #[error("Batch file not found: {0}")]
    BatchNotFound(String),
    #[error(
        "Sync is not configured. Set SHELFMARK_SYNC_URL and SHELFMARK_SYNC_TOKEN to enable `shelfmark sync`."
    )]
    SyncNotConfigured,
}
