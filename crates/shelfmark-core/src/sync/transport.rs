//! Remote sync transport seam
//!
//! The core never talks to a network itself; it consumes batches of
//! record snapshots from whatever transport is wired in. Delivery and
//! retry policy belong to the transport.

use std::path::PathBuf;

use crate::models::Paper;
use crate::Result;

/// Source of incoming record snapshots
#[allow(async_fn_in_trait)]
pub trait SyncTransport {
    /// Whether the remote backend is currently enabled
    async fn is_enabled(&self) -> bool;

    /// Fetch the next batch of record snapshots
    async fn fetch_batch(&self) -> Result<Vec<Paper>>;
}

/// Transport reading a JSON array of paper snapshots from a file
///
/// Used by the CLI to replay an exported batch; the backend counts as
/// disabled while the file does not exist.
#[derive(Debug, Clone)]
pub struct JsonBatchTransport {
    path: PathBuf,
}

impl JsonBatchTransport {
    /// Create a transport reading from the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SyncTransport for JsonBatchTransport {
    async fn is_enabled(&self) -> bool {
        self.path.exists()
    }

    async fn fetch_batch(&self) -> Result<Vec<Paper>> {
        let data = std::fs::read_to_string(&self.path)?;
        let papers: Vec<Paper> = serde_json::from_str(&data)?;
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_missing_file_is_disabled() {
        let transport = JsonBatchTransport::new("/nonexistent/batch.json");
        assert!(!transport.is_enabled().await);
    }

    #[tokio::test]
    async fn test_reads_paper_snapshots() {
        let paper = Paper::new("smith2023");
        let json = serde_json::to_string(&vec![paper.clone()]).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let transport = JsonBatchTransport::new(file.path());
        assert!(transport.is_enabled().await);

        let batch = transport.fetch_batch().await.unwrap();
        assert_eq!(batch, vec![paper]);
    }

    #[tokio::test]
    async fn test_malformed_batch_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        let transport = JsonBatchTransport::new(file.path());
        assert!(transport.fetch_batch().await.is_err());
    }
}
