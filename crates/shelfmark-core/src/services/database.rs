//! Shared database service wrapper used across clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlLibraryRepository, LibSqlPaperRepository, LibraryRepository, MigrationCounts,
    PaperRepository, SyncConfig,
};
use crate::models::{
    Collection, Library, LibraryId, Paper, PaperId, SavedSearch, SyncConflict,
};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// Writes are serialized through the inner lock; every service that needs
/// persistent state shares one clone of this handle.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        sync_config: Option<SyncConfig>,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if let Some(config) = sync_config {
            tracing::info!(
                "Sync enabled with remote: {}",
                config.url.as_deref().unwrap_or("unknown")
            );
            Database::open_with_sync(&db_path, config).await?
        } else {
            tracing::info!("Running in local-only mode (no sync config)");
            Database::open(&db_path).await?
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open a local-only database service at the given path.
    pub async fn open_local_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_path(db_path, None).await
    }

    /// Open a sync-enabled database service at the given path.
    pub async fn open_sync_path(
        db_path: impl Into<PathBuf>,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        Self::open_path(db_path, Some(sync_config)).await
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Sync with remote DB when sync is enabled.
    pub async fn sync(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.sync().await
    }

    /// Returns whether sync is configured for this DB.
    pub async fn is_sync_enabled(&self) -> bool {
        let db = self.db.lock().await;
        db.is_sync_enabled()
    }

    /// Insert a new paper.
    pub async fn create_paper(&self, paper: &Paper) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.create(paper).await
    }

    /// Fetch a paper by id.
    pub async fn get_paper(&self, id: &PaperId) -> Result<Option<Paper>> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.get(id).await
    }

    /// Fetch a paper by exact citekey.
    pub async fn get_paper_by_citekey(&self, citekey: &str) -> Result<Option<Paper>> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.get_by_citekey(citekey).await
    }

    /// Find a paper by DOI or arXiv id.
    pub async fn find_paper_by_identifiers(
        &self,
        doi: Option<&str>,
        arxiv_id: Option<&str>,
    ) -> Result<Option<Paper>> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.find_by_identifiers(doi, arxiv_id).await
    }

    /// List papers, most recently updated first.
    pub async fn list_papers(&self, limit: usize, offset: usize) -> Result<Vec<Paper>> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.list(limit, offset).await
    }

    /// List every paper, oldest first.
    pub async fn list_all_papers(&self) -> Result<Vec<Paper>> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.list_all().await
    }

    /// Persist a paper's current state.
    pub async fn update_paper(&self, paper: &Paper) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.update(paper).await
    }

    /// Soft-delete a paper.
    pub async fn delete_paper(&self, id: &PaperId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.delete(id).await
    }

    /// Fold duplicate papers into a survivor, atomically.
    pub async fn merge_paper_duplicates(
        &self,
        survivor: &Paper,
        duplicates: &[PaperId],
    ) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.merge_duplicates(survivor, duplicates).await
    }

    /// Append a resolved field conflict to the conflict log.
    pub async fn record_sync_conflict(
        &self,
        paper_id: &PaperId,
        field: &str,
        local_ts: i64,
        incoming_ts: i64,
        winner: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.record_conflict(paper_id, field, local_ts, incoming_ts, winner)
            .await
    }

    /// List recently resolved field conflicts.
    pub async fn list_sync_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = LibSqlPaperRepository::new(db.connection());
        repo.list_conflicts(limit).await
    }

    /// Insert a new library.
    pub async fn create_library(&self, library: &Library) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.create(library).await
    }

    /// Fetch a library by id.
    pub async fn get_library(&self, id: &LibraryId) -> Result<Option<Library>> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.get(id).await
    }

    /// List all libraries, oldest first.
    pub async fn list_libraries(&self) -> Result<Vec<Library>> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.list().await
    }

    /// Add a paper to a library.
    pub async fn add_paper_to_library(
        &self,
        library_id: &LibraryId,
        paper_id: &PaperId,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.add_paper(library_id, paper_id).await
    }

    /// List the papers in a library.
    pub async fn list_library_paper_ids(&self, library_id: &LibraryId) -> Result<Vec<PaperId>> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.list_paper_ids(library_id).await
    }

    /// Count the papers in a library.
    pub async fn count_library_papers(&self, library_id: &LibraryId) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.count_papers(library_id).await
    }

    /// Insert a new collection.
    pub async fn create_collection(&self, collection: &Collection) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.create_collection(collection).await
    }

    /// List the collections in a library.
    pub async fn list_collections(&self, library_id: &LibraryId) -> Result<Vec<Collection>> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.list_collections(library_id).await
    }

    /// Insert a new saved search.
    pub async fn create_saved_search(&self, search: &SavedSearch) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.create_saved_search(search).await
    }

    /// List the saved searches in a library.
    pub async fn list_saved_searches(&self, library_id: &LibraryId) -> Result<Vec<SavedSearch>> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.list_saved_searches(library_id).await
    }

    /// Merge duplicate libraries into a survivor, atomically.
    pub async fn merge_library_cluster(
        &self,
        survivor: &LibraryId,
        losers: &[LibraryId],
    ) -> Result<MigrationCounts> {
        let db = self.db.lock().await;
        let repo = LibSqlLibraryRepository::new(db.connection());
        repo.merge_cluster(survivor, losers).await
    }
}
