//! Duplicate cleanup
//!
//! Every device bootstraps its own default library on first run, so a
//! freshly linked installation ends up with one same-named library per
//! device after its first sync. [`LibraryDeduplicationService`] collapses
//! those provisioning artifacts: libraries whose names normalize to the
//! same string and whose creation times chain within a 24 hour window are
//! merged into a single survivor, preferring the well-known default
//! library id so every device converges on the same one.
//! [`PaperDeduplicationService`] does the analogous cleanup for papers
//! that ended up stored twice under the same external identifier.

mod papers;

pub use papers::{PaperDedupResult, PaperDeduplicationService};

use std::collections::BTreeMap;

use crate::db::MigrationCounts;
use crate::events::{EventBus, SyncEvent};
use crate::models::{Library, LibraryId};
use crate::services::DatabaseService;
use crate::util::normalize_library_name;
use crate::Result;

/// Same-named libraries created within this span of each other are
/// treated as provisioning duplicates (Unix ms)
const DEDUP_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Outcome of merging one cluster of duplicate libraries
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DedupResult {
    /// Library the cluster collapsed into
    pub survivor: LibraryId,
    /// The survivor's name
    pub name: String,
    /// Libraries merged away and deleted
    pub merged: Vec<LibraryId>,
    /// Rows re-parented to the survivor
    pub counts: MigrationCounts,
}

/// Detects and merges duplicate libraries
#[derive(Clone)]
pub struct LibraryDeduplicationService {
    db: DatabaseService,
    events: EventBus,
}

impl LibraryDeduplicationService {
    /// Create a deduplication service over the given database
    pub const fn new(db: DatabaseService, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Merge duplicate libraries, returning one result per merged cluster
    ///
    /// System and local-only libraries are never touched. Each cluster is
    /// merged in its own transaction, so a failure partway leaves earlier
    /// clusters merged and the failing one untouched. Running again on a
    /// clean corpus returns an empty list.
    pub async fn deduplicate_libraries(&self) -> Result<Vec<DedupResult>> {
        let libraries = self.db.list_libraries().await?;

        let mut groups: BTreeMap<String, Vec<Library>> = BTreeMap::new();
        for library in libraries.into_iter().filter(Library::is_deduplicable) {
            groups
                .entry(normalize_library_name(&library.name))
                .or_default()
                .push(library);
        }

        let mut results = Vec::new();
        for (_, mut group) in groups {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.as_str().cmp(&b.id.as_str()))
            });

            for cluster in chain_clusters(&group) {
                let [first, rest @ ..] = cluster else {
                    continue;
                };
                if rest.is_empty() {
                    continue;
                }
                // The canonical default library always survives; otherwise
                // the oldest member does.
                let survivor = cluster
                    .iter()
                    .find(|l| l.id == Library::DEFAULT_ID)
                    .unwrap_or(first);
                results.push(self.merge_cluster(survivor, cluster).await?);
            }
        }

        if !results.is_empty() {
            tracing::info!("Merged {} duplicate library cluster(s)", results.len());
        }
        Ok(results)
    }

    async fn merge_cluster(&self, survivor: &Library, cluster: &[Library]) -> Result<DedupResult> {
        let losers: Vec<LibraryId> = cluster
            .iter()
            .filter(|l| l.id != survivor.id)
            .map(|l| l.id)
            .collect();

        let counts = self.db.merge_library_cluster(&survivor.id, &losers).await?;
        let result = DedupResult {
            survivor: survivor.id,
            name: survivor.name.clone(),
            merged: losers,
            counts,
        };

        tracing::info!(
            survivor = %result.survivor,
            name = %result.name,
            merged = result.merged.len(),
            papers = counts.papers,
            "Merged duplicate libraries"
        );
        self.events.emit(SyncEvent::LibrariesMerged(result.clone()));
        Ok(result)
    }
}

/// Split a created-at-sorted run of same-named libraries into clusters
/// chained by consecutive gaps of at most the dedup window
fn chain_clusters(sorted: &[Library]) -> Vec<&[Library]> {
    let mut clusters = Vec::new();
    let mut start = 0;
    for i in 1..sorted.len() {
        if sorted[i].created_at - sorted[i - 1].created_at > DEDUP_WINDOW_MS {
            clusters.push(&sorted[start..i]);
            start = i;
        }
    }
    if start < sorted.len() {
        clusters.push(&sorted[start..]);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paper;
    use pretty_assertions::assert_eq;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const BASE_MS: i64 = 1_700_000_000_000;

    async fn setup() -> (DatabaseService, LibraryDeduplicationService) {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let service = LibraryDeduplicationService::new(db.clone(), EventBus::default());
        (db, service)
    }

    fn library_at(name: &str, created_at: i64) -> Library {
        let mut library = Library::new(name);
        library.created_at = created_at;
        library
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_provisioning_duplicates_collapse_into_canonical() {
        let (db, service) = setup().await;

        // Two other devices bootstrapped their own default library.
        let device_b = Library::new("My Library");
        let device_c = Library::new(" my LIBRARY ");
        db.create_library(&device_b).await.unwrap();
        db.create_library(&device_c).await.unwrap();

        let paper = Paper::new("smith2023");
        db.create_paper(&paper).await.unwrap();
        db.add_paper_to_library(&device_b.id, &paper.id).await.unwrap();

        let results = service.deduplicate_libraries().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, Library::DEFAULT_ID);
        assert_eq!(results[0].merged.len(), 2);
        assert_eq!(results[0].counts.papers, 1);

        let remaining = db.list_libraries().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, Library::DEFAULT_ID);
        assert_eq!(
            db.count_library_papers(&Library::DEFAULT_ID).await.unwrap(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_oldest_survives_without_canonical_member() {
        let (db, service) = setup().await;

        let oldest = library_at("ML Papers", BASE_MS);
        let middle = library_at("ml papers", BASE_MS + HOUR_MS);
        let newest = library_at("ML PAPERS", BASE_MS + 2 * HOUR_MS);
        for library in [&newest, &oldest, &middle] {
            db.create_library(library).await.unwrap();
        }

        let results = service.deduplicate_libraries().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, oldest.id);

        assert!(db.get_library(&oldest.id).await.unwrap().is_some());
        assert!(db.get_library(&middle.id).await.unwrap().is_none());
        assert!(db.get_library(&newest.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_canonical_survivor_beats_age() {
        let (db, service) = setup().await;

        // Two older same-named libraries from other devices; the canonical
        // default is the newest member of the cluster and must still win.
        let default = db.get_library(&Library::DEFAULT_ID).await.unwrap().unwrap();
        let oldest = library_at(Library::DEFAULT_NAME, default.created_at - 2 * HOUR_MS);
        let middle = library_at(Library::DEFAULT_NAME, default.created_at - HOUR_MS);
        db.create_library(&oldest).await.unwrap();
        db.create_library(&middle).await.unwrap();

        let paper = Paper::new("knuth1974");
        db.create_paper(&paper).await.unwrap();
        db.add_paper_to_library(&oldest.id, &paper.id).await.unwrap();

        let results = service.deduplicate_libraries().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, Library::DEFAULT_ID);

        assert!(db.get_library(&oldest.id).await.unwrap().is_none());
        assert!(db.get_library(&middle.id).await.unwrap().is_none());
        assert_eq!(
            db.count_library_papers(&Library::DEFAULT_ID).await.unwrap(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_window_boundary_is_inclusive() {
        let (db, service) = setup().await;

        // Exactly one window apart merges; one millisecond past does not.
        let a = library_at("within", BASE_MS);
        let b = library_at("within", BASE_MS + 24 * HOUR_MS);
        let c = library_at("past", BASE_MS);
        let d = library_at("past", BASE_MS + 24 * HOUR_MS + 1);
        for library in [&a, &b, &c, &d] {
            db.create_library(library).await.unwrap();
        }

        let results = service.deduplicate_libraries().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, a.id);

        assert!(db.get_library(&c.id).await.unwrap().is_some());
        assert!(db.get_library(&d.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chained_gaps_extend_one_cluster() {
        let (db, service) = setup().await;

        // 40 hours end to end, but every consecutive gap fits the window.
        let a = library_at("chained", BASE_MS);
        let b = library_at("chained", BASE_MS + 20 * HOUR_MS);
        let c = library_at("chained", BASE_MS + 40 * HOUR_MS);
        for library in [&a, &b, &c] {
            db.create_library(library).await.unwrap();
        }

        let results = service.deduplicate_libraries().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, a.id);
        assert_eq!(results[0].merged.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_different_names_never_merge() {
        let (db, service) = setup().await;

        db.create_library(&Library::new("ML Papers")).await.unwrap();
        db.create_library(&Library::new("Reading Group"))
            .await
            .unwrap();

        let results = service.deduplicate_libraries().await.unwrap();
        assert!(results.is_empty());
        assert_eq!(db.list_libraries().await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_system_and_local_only_libraries_are_untouched() {
        let (db, service) = setup().await;

        let mut system = library_at("archives", BASE_MS);
        system.is_system = true;
        let plain_archives = library_at("archives", BASE_MS + HOUR_MS);
        let mut local_only = library_at("scratch", BASE_MS);
        local_only.is_local_only = true;
        let plain_scratch = library_at("scratch", BASE_MS + HOUR_MS);
        for library in [&system, &plain_archives, &local_only, &plain_scratch] {
            db.create_library(library).await.unwrap();
        }

        let results = service.deduplicate_libraries().await.unwrap();
        assert!(results.is_empty());
        assert_eq!(db.list_libraries().await.unwrap().len(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_run_finds_nothing() {
        let (db, service) = setup().await;

        db.create_library(&Library::new("My Library")).await.unwrap();
        db.create_library(&Library::new("My Library")).await.unwrap();

        let first = service.deduplicate_libraries().await.unwrap();
        assert_eq!(first.len(), 1);

        let second = service.deduplicate_libraries().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(db.list_libraries().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_each_merge_publishes_an_event() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let events = EventBus::default();
        let service = LibraryDeduplicationService::new(db.clone(), events.clone());

        db.create_library(&Library::new("My Library")).await.unwrap();

        let mut rx = events.subscribe();
        let results = service.deduplicate_libraries().await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::LibrariesMerged(results[0].clone())
        );
    }

    #[test]
    fn test_chain_clusters_splits_on_large_gaps() {
        let libraries = vec![
            library_at("x", BASE_MS),
            library_at("x", BASE_MS + HOUR_MS),
            library_at("x", BASE_MS + 30 * HOUR_MS),
        ];

        let clusters = chain_clusters(&libraries);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[1].len(), 1);
    }
}
