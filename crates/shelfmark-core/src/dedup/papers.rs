//! Paper deduplication
//!
//! The sync loop's duplicate check runs concurrently with writers, so a
//! race can leave two rows for the same publication, each under its own
//! citekey. [`PaperDeduplicationService`] is the corrective pass: it
//! scans the corpus oldest-first, groups papers by normalized DOI and
//! version-stripped arXiv id, and folds every later copy into the first
//! one under the usual last-writer-wins rules, so no edit is lost.

use std::collections::BTreeMap;

use crate::events::{EventBus, SyncEvent};
use crate::merge::FieldMerger;
use crate::models::{Paper, PaperId};
use crate::services::DatabaseService;
use crate::util::{normalize_doi, strip_arxiv_version};
use crate::Result;

/// Outcome of folding one cluster of duplicate papers
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PaperDedupResult {
    /// Paper the cluster folded into
    pub survivor: PaperId,
    /// The survivor's citekey after the fold
    pub citekey: String,
    /// Papers folded away and deleted
    pub merged: Vec<PaperId>,
    /// Library memberships re-parented to the survivor
    pub memberships: usize,
}

/// Detects and folds papers stored twice under the same identifier
#[derive(Clone)]
pub struct PaperDeduplicationService {
    db: DatabaseService,
    events: EventBus,
}

impl PaperDeduplicationService {
    /// Create a deduplication service over the given database
    pub const fn new(db: DatabaseService, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Fold duplicate papers, returning one result per folded cluster
    ///
    /// The oldest copy of each identifier survives; later copies merge
    /// into it field by field and are deleted. Each cluster is folded in
    /// its own transaction, so a failure partway leaves earlier clusters
    /// folded and the failing one untouched. Running again on a clean
    /// corpus returns an empty list.
    pub async fn deduplicate_papers(&self) -> Result<Vec<PaperDedupResult>> {
        let papers = self.db.list_all_papers().await?;

        let mut survivors: Vec<Paper> = Vec::new();
        let mut duplicates_for: Vec<Vec<Paper>> = Vec::new();
        let mut by_doi: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_arxiv: BTreeMap<String, usize> = BTreeMap::new();

        for paper in papers {
            let doi_key = paper
                .doi
                .as_deref()
                .map(normalize_doi)
                .filter(|key| !key.is_empty());
            let arxiv_key = paper
                .arxiv_id
                .as_deref()
                .map(strip_arxiv_version)
                .filter(|key| !key.is_empty());

            let owner = doi_key
                .as_ref()
                .and_then(|key| by_doi.get(key))
                .or_else(|| arxiv_key.as_ref().and_then(|key| by_arxiv.get(key)))
                .copied();

            match owner {
                Some(index) => {
                    // An identifier first seen on a duplicate still points
                    // at its survivor, so bridged copies fold in one pass.
                    if let Some(key) = doi_key {
                        by_doi.entry(key).or_insert(index);
                    }
                    if let Some(key) = arxiv_key {
                        by_arxiv.entry(key).or_insert(index);
                    }
                    duplicates_for[index].push(paper);
                }
                None => {
                    let index = survivors.len();
                    if let Some(key) = doi_key {
                        by_doi.insert(key, index);
                    }
                    if let Some(key) = arxiv_key {
                        by_arxiv.insert(key, index);
                    }
                    survivors.push(paper);
                    duplicates_for.push(Vec::new());
                }
            }
        }

        let mut results = Vec::new();
        for (survivor, duplicates) in survivors.into_iter().zip(duplicates_for) {
            if duplicates.is_empty() {
                continue;
            }
            results.push(self.fold_cluster(survivor, &duplicates).await?);
        }

        if !results.is_empty() {
            tracing::info!("Folded {} duplicate paper cluster(s)", results.len());
        }
        Ok(results)
    }

    async fn fold_cluster(
        &self,
        survivor: Paper,
        duplicates: &[Paper],
    ) -> Result<PaperDedupResult> {
        let mut folded = survivor;
        for duplicate in duplicates {
            folded = FieldMerger::merge_papers(&folded, duplicate).merged;
        }

        let merged: Vec<PaperId> = duplicates.iter().map(|paper| paper.id).collect();
        let memberships = self.db.merge_paper_duplicates(&folded, &merged).await?;

        let result = PaperDedupResult {
            survivor: folded.id,
            citekey: folded.citekey.clone(),
            merged,
            memberships,
        };

        tracing::info!(
            survivor = %result.survivor,
            citekey = %result.citekey,
            merged = result.merged.len(),
            memberships = result.memberships,
            "Folded duplicate papers"
        );
        self.events.emit(SyncEvent::PapersMerged(result.clone()));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Library, ScalarField};
    use pretty_assertions::assert_eq;

    const BASE_MS: i64 = 1_700_000_000_000;

    async fn setup() -> (DatabaseService, PaperDeduplicationService) {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let service = PaperDeduplicationService::new(db.clone(), EventBus::default());
        (db, service)
    }

    fn paper_at(citekey: &str, created_at: i64) -> Paper {
        let mut paper = Paper::new(citekey);
        paper.created_at = created_at;
        paper
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_doi_folds_into_oldest() {
        let (db, service) = setup().await;

        let mut older = paper_at("vaswani2017", BASE_MS);
        older.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.48550/arXiv.1706.03762".to_string()),
            100,
        );
        older.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Old title".to_string()),
            100,
        );
        let mut newer = paper_at("vaswani2017attention", BASE_MS + 1);
        newer.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.48550/ARXIV.1706.03762".to_string()),
            90,
        );
        newer.set_field_at(
            ScalarField::Title,
            FieldValue::Text("Attention Is All You Need".to_string()),
            200,
        );
        newer.add_tag("transformers");
        db.create_paper(&older).await.unwrap();
        db.create_paper(&newer).await.unwrap();

        let results = service.deduplicate_papers().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, older.id);
        assert_eq!(results[0].merged, vec![newer.id]);

        // The fold is a real merge: later edits and tags carry over.
        let folded = db.get_paper(&older.id).await.unwrap().unwrap();
        assert_eq!(folded.title.as_deref(), Some("Attention Is All You Need"));
        assert!(folded.tags.contains("transformers"));

        assert!(db.get_paper(&newer.id).await.unwrap().is_none());
        assert_eq!(db.list_papers(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_arxiv_ignores_version() {
        let (db, service) = setup().await;

        let mut versioned = paper_at("vaswani2017", BASE_MS);
        versioned.set_field_at(
            ScalarField::ArxivId,
            FieldValue::Text("1706.03762v5".to_string()),
            100,
        );
        let mut bare = paper_at("vaswani2017a", BASE_MS + 1);
        bare.set_field_at(
            ScalarField::ArxivId,
            FieldValue::Text("1706.03762".to_string()),
            110,
        );
        db.create_paper(&versioned).await.unwrap();
        db.create_paper(&bare).await.unwrap();

        let results = service.deduplicate_papers().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, versioned.id);
        assert_eq!(results[0].merged, vec![bare.id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_memberships_move_without_duplication() {
        let (db, service) = setup().await;

        let shelf = Library::new("ML Papers");
        db.create_library(&shelf).await.unwrap();

        let mut survivor = paper_at("smith2023", BASE_MS);
        survivor.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/races".to_string()),
            100,
        );
        let mut duplicate = paper_at("smith2023a", BASE_MS + 1);
        duplicate.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/RACES".to_string()),
            110,
        );
        db.create_paper(&survivor).await.unwrap();
        db.create_paper(&duplicate).await.unwrap();
        db.add_paper_to_library(&Library::DEFAULT_ID, &survivor.id)
            .await
            .unwrap();
        db.add_paper_to_library(&Library::DEFAULT_ID, &duplicate.id)
            .await
            .unwrap();
        db.add_paper_to_library(&shelf.id, &duplicate.id).await.unwrap();

        let results = service.deduplicate_papers().await.unwrap();
        assert_eq!(results.len(), 1);
        // The default membership was shared, so only the shelf row moved.
        assert_eq!(results[0].memberships, 1);

        assert_eq!(
            db.count_library_papers(&Library::DEFAULT_ID).await.unwrap(),
            1
        );
        assert_eq!(
            db.list_library_paper_ids(&shelf.id).await.unwrap(),
            vec![survivor.id]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bridged_identifiers_fold_in_one_pass() {
        let (db, service) = setup().await;

        // b shares a DOI with a and an arXiv id with c; all three are
        // the same publication.
        let mut a = paper_at("attention2017", BASE_MS);
        a.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.48550/arXiv.1706.03762".to_string()),
            100,
        );
        let mut b = paper_at("attention2017a", BASE_MS + 1);
        b.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.48550/arXiv.1706.03762".to_string()),
            110,
        );
        b.set_field_at(
            ScalarField::ArxivId,
            FieldValue::Text("1706.03762".to_string()),
            110,
        );
        let mut c = paper_at("attention2017b", BASE_MS + 2);
        c.set_field_at(
            ScalarField::ArxivId,
            FieldValue::Text("1706.03762v5".to_string()),
            120,
        );
        for paper in [&a, &b, &c] {
            db.create_paper(paper).await.unwrap();
        }

        let results = service.deduplicate_papers().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].survivor, a.id);
        assert_eq!(results[0].merged, vec![b.id, c.id]);
        assert_eq!(db.list_papers(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_distinct_identifiers_never_fold() {
        let (db, service) = setup().await;

        let mut a = paper_at("smith2023", BASE_MS);
        a.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/alpha".to_string()),
            100,
        );
        let mut b = paper_at("jones2024", BASE_MS + 1);
        b.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/beta".to_string()),
            110,
        );
        // No identifiers at all; never a dedup candidate.
        let c = paper_at("notes2024", BASE_MS + 2);
        for paper in [&a, &b, &c] {
            db.create_paper(paper).await.unwrap();
        }

        let results = service.deduplicate_papers().await.unwrap();
        assert!(results.is_empty());
        assert_eq!(db.list_papers(10, 0).await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_run_finds_nothing() {
        let (db, service) = setup().await;

        let mut a = paper_at("smith2023", BASE_MS);
        a.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/races".to_string()),
            100,
        );
        let mut b = paper_at("smith2023a", BASE_MS + 1);
        b.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/races".to_string()),
            110,
        );
        db.create_paper(&a).await.unwrap();
        db.create_paper(&b).await.unwrap();

        let first = service.deduplicate_papers().await.unwrap();
        assert_eq!(first.len(), 1);

        let second = service.deduplicate_papers().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(db.list_papers(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_each_fold_publishes_an_event() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let events = EventBus::default();
        let service = PaperDeduplicationService::new(db.clone(), events.clone());

        let mut a = paper_at("smith2023", BASE_MS);
        a.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/races".to_string()),
            100,
        );
        let mut b = paper_at("smith2023a", BASE_MS + 1);
        b.set_field_at(
            ScalarField::Doi,
            FieldValue::Text("10.1/races".to_string()),
            110,
        );
        db.create_paper(&a).await.unwrap();
        db.create_paper(&b).await.unwrap();

        let mut rx = events.subscribe();
        let results = service.deduplicate_papers().await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::PapersMerged(results[0].clone())
        );
    }
}
