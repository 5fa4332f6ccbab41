//! Sync orchestration
//!
//! [`SyncService`] drives one reconciliation pass: fetch a batch of
//! incoming record snapshots, classify each against the local corpus
//! (already held, identifier duplicate, citekey collision, new), merge
//! or insert, and persist record by record so interrupted batches keep
//! their progress. State transitions and batch completions are published
//! on the event bus for observers.

mod detector;
mod transport;

pub use detector::{CitekeyConflict, ConflictDetector};
pub use transport::{JsonBatchTransport, SyncTransport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::events::{EventBus, SyncEvent};
use crate::merge::{FieldMerger, MergeSide};
use crate::models::{FieldValue, Library, Paper, ScalarField};
use crate::services::DatabaseService;
use crate::{Error, Result};

/// States of the sync state machine
///
/// Only `Syncing` performs I/O. A failed pass parks the machine in
/// `Error` until [`SyncService::reset`] or the next successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Error(String),
}

/// Summary of one sync batch
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    /// Records processed (inserted or merged)
    pub applied: usize,
    /// Records inserted as new papers
    pub inserted: usize,
    /// Records merged into an existing paper
    pub merged: usize,
    /// Records whose citekey was auto-renamed
    pub renamed: usize,
    /// Field-level conflicts recorded while merging
    pub conflicts: usize,
    /// Whether the batch stopped early on a cancellation request
    pub cancelled: bool,
}

/// Orchestrates reconciliation of incoming record snapshots
///
/// At most one sync runs at a time per service; a second call while one
/// is in flight is rejected without touching the state machine.
#[derive(Clone)]
pub struct SyncService<T> {
    db: DatabaseService,
    transport: T,
    detector: ConflictDetector,
    events: EventBus,
    state: Arc<Mutex<SyncState>>,
    running: Arc<Mutex<()>>,
    cancel: Arc<AtomicBool>,
}

impl<T: SyncTransport> SyncService<T> {
    /// Create a sync service over the given database and transport
    pub fn new(db: DatabaseService, transport: T, events: EventBus) -> Self {
        let detector = ConflictDetector::new(db.clone());
        Self {
            db,
            transport,
            detector,
            events,
            state: Arc::new(Mutex::new(SyncState::Idle)),
            running: Arc::new(Mutex::new(())),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current state of the sync machine
    pub async fn state(&self) -> SyncState {
        self.state.lock().await.clone()
    }

    /// Subscribe to sync events
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Request cancellation of the running (or next) batch
    ///
    /// Honored between records; the record being applied always runs to
    /// completion. Work applied before the stop remains persisted.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Clear the error state after a failed pass
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, SyncState::Error(_)) {
            *state = SyncState::Idle;
            drop(state);
            self.events.emit(SyncEvent::StateChanged(SyncState::Idle));
        }
    }

    /// Run one reconciliation pass
    ///
    /// A disabled backend skips the pass: empty report, no state
    /// transition, no events. A second call while a pass is in flight
    /// is rejected without touching the state machine.
    pub async fn sync(&self) -> Result<SyncReport> {
        let Ok(_running) = self.running.try_lock() else {
            return Err(Error::Sync("Sync already in progress".into()));
        };

        if !self.transport.is_enabled().await {
            tracing::info!("Sync skipped: remote backend is disabled");
            return Ok(SyncReport::default());
        }

        self.set_state(SyncState::Syncing).await;
        let result = self.run_batch().await;
        self.cancel.store(false, Ordering::SeqCst);

        match result {
            Ok(report) => {
                self.set_state(SyncState::Idle).await;
                self.events.emit(SyncEvent::Completed(report.clone()));
                tracing::info!(
                    applied = report.applied,
                    inserted = report.inserted,
                    merged = report.merged,
                    renamed = report.renamed,
                    conflicts = report.conflicts,
                    cancelled = report.cancelled,
                    "Sync completed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Sync failed: {e}");
                self.set_state(SyncState::Error(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn set_state(&self, next: SyncState) {
        {
            let mut state = self.state.lock().await;
            *state = next.clone();
        }
        self.events.emit(SyncEvent::StateChanged(next));
    }

    async fn run_batch(&self) -> Result<SyncReport> {
        let batch = self.transport.fetch_batch().await?;
        tracing::info!("Fetched {} record snapshots", batch.len());

        let mut report = SyncReport::default();
        for incoming in batch {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!("Sync cancelled after {} records", report.applied);
                report.cancelled = true;
                break;
            }
            self.apply_record(incoming, &mut report).await?;
            report.applied += 1;
        }

        // Flush to the remote replica when configured; no-op locally.
        self.db.sync().await?;
        Ok(report)
    }

    /// Reconcile a single incoming snapshot against the corpus
    async fn apply_record(&self, mut incoming: Paper, report: &mut SyncReport) -> Result<()> {
        // Identity first: a re-delivered snapshot of a record we already
        // hold merges into that row even when it carries no external
        // identifier. The identifier lookup catches the same publication
        // arriving under a different id from another device.
        let local_match = match self.db.get_paper(&incoming.id).await? {
            Some(held) => Some(held),
            None => {
                self.detector
                    .find_duplicate(incoming.doi.as_deref(), incoming.arxiv_id.as_deref())
                    .await?
            }
        };

        if let Some(conflict) = self
            .detector
            .detect_citekey_conflict(&incoming.citekey, &incoming.id)
            .await?
        {
            // The key's holder being the very paper we merge into is not
            // a collision, just the same record on both sides.
            let merging_into = local_match.as_ref().map(|p| p.id);
            if merging_into != Some(conflict.existing_id) {
                let renamed = self.rename_citekey(&incoming).await?;
                tracing::info!(
                    from = %incoming.citekey,
                    to = %renamed,
                    "Citekey collision, renamed incoming record"
                );
                incoming.set_field(ScalarField::Citekey, FieldValue::Text(renamed));
                report.renamed += 1;
            }
        }

        if let Some(local) = local_match {
            let result = FieldMerger::merge_papers(&local, &incoming);
            for conflict in &result.conflicts {
                let winner = match conflict.winner {
                    MergeSide::Local => "local",
                    MergeSide::Remote => "incoming",
                };
                self.db
                    .record_sync_conflict(
                        &local.id,
                        conflict.field.name(),
                        conflict.local_ts,
                        conflict.remote_ts,
                        winner,
                    )
                    .await?;
            }
            report.conflicts += result.conflicts.len();
            self.db.update_paper(&result.merged).await?;
            report.merged += 1;
            tracing::debug!(
                id = %local.id,
                fields = result.fields_from_remote.len(),
                "Merged incoming snapshot into existing paper"
            );
        } else {
            self.db.create_paper(&incoming).await?;
            self.db
                .add_paper_to_library(&Library::DEFAULT_ID, &incoming.id)
                .await?;
            report.inserted += 1;
            tracing::debug!(id = %incoming.id, citekey = %incoming.citekey, "Inserted new paper");
        }

        Ok(())
    }

    /// Build a unique replacement citekey for a colliding incoming record
    async fn rename_citekey(&self, incoming: &Paper) -> Result<String> {
        let base = format!("{}-{}", incoming.citekey, incoming.id.short_suffix());
        let mut candidate = base.clone();
        let mut attempt = 2;
        while self
            .detector
            .detect_citekey_conflict(&candidate, &incoming.id)
            .await?
            .is_some()
        {
            candidate = format!("{base}-{attempt}");
            attempt += 1;
        }
        Ok(candidate)
    }
}
