//! Identity conflict detection
//!
//! Two independent questions, both read-only against the local corpus:
//! does an incoming record's citekey collide with a different paper, and
//! does one of its external identifiers already identify a paper here.
//! Both are safe to run concurrently with writers; the worst staleness
//! can cause is a duplicate row, which the paper dedup pass folds back
//! into one.

use crate::models::{Paper, PaperId};
use crate::services::DatabaseService;
use crate::Result;

/// A citekey already held by a different paper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitekeyConflict {
    /// Paper that already holds the key
    pub existing_id: PaperId,
    /// Paper that wanted the key
    pub incoming_id: PaperId,
}

/// Read-only identity queries against the corpus
#[derive(Clone)]
pub struct ConflictDetector {
    db: DatabaseService,
}

impl ConflictDetector {
    /// Create a detector over the given database
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Check whether a different paper already uses this citekey
    ///
    /// The paper holding the key stays untouched either way; resolution
    /// (renaming the incoming record) is the sync loop's policy.
    pub async fn detect_citekey_conflict(
        &self,
        citekey: &str,
        incoming_id: &PaperId,
    ) -> Result<Option<CitekeyConflict>> {
        match self.db.get_paper_by_citekey(citekey).await? {
            Some(existing) if existing.id != *incoming_id => Ok(Some(CitekeyConflict {
                existing_id: existing.id,
                incoming_id: *incoming_id,
            })),
            _ => Ok(None),
        }
    }

    /// Find the paper sharing one of these external identifiers, if any
    pub async fn find_duplicate(
        &self,
        doi: Option<&str>,
        arxiv_id: Option<&str>,
    ) -> Result<Option<Paper>> {
        self.db.find_paper_by_identifiers(doi, arxiv_id).await
    }

    /// Check whether any paper shares one of these external identifiers
    pub async fn is_duplicate_by_identifiers(
        &self,
        doi: Option<&str>,
        arxiv_id: Option<&str>,
    ) -> Result<bool> {
        Ok(self.find_duplicate(doi, arxiv_id).await?.is_some())
    }
}
