//! Event bus for sync and dedup notifications
//!
//! Observers (UI surfaces, the CLI) subscribe for status updates; emission
//! never blocks and never fails, even with no subscribers. Delivery is
//! at-least-once to live subscribers with no ordering guarantee across
//! event kinds; a lagging subscriber loses oldest events first.

use tokio::sync::broadcast;

use crate::dedup::{DedupResult, PaperDedupResult};
use crate::sync::{SyncReport, SyncState};

const DEFAULT_CAPACITY: usize = 1024;

/// Events published by the sync and dedup services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The sync state machine moved to a new state
    StateChanged(SyncState),
    /// A sync batch finished
    Completed(SyncReport),
    /// A dedup pass merged a cluster of duplicate libraries
    LibrariesMerged(DedupResult),
    /// A dedup pass folded a cluster of duplicate papers
    PapersMerged(PaperDedupResult),
}

/// Broadcast channel for [`SyncEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` undelivered events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    ///
    /// Emitting with no subscribers is a no-op.
    pub fn emit(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published after this call
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
