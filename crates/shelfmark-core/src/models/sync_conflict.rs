//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Recorded field-level conflict resolved during a merge
///
/// A row is written whenever both sides of a merge had explicitly set the
/// same field to different values; the loser's value is gone, so the log
/// is the only place the override remains visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Paper involved in the conflict
    pub paper_id: String,
    /// Field that conflicted
    pub field: String,
    /// Local side's timestamp for the field (Unix us)
    pub local_ts: i64,
    /// Incoming side's timestamp for the field (Unix us)
    pub incoming_ts: i64,
    /// Which side won ("local" or "incoming")
    pub winner: String,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: i64,
}
