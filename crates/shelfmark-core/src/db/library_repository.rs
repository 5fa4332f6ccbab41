//! Library repository implementation

use crate::error::{Error, Result};
use crate::models::{Collection, Library, LibraryId, PaperId, SavedSearch};
use libsql::Connection;

/// Rows moved while merging duplicate libraries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MigrationCounts {
    /// Paper memberships re-parented to the survivor
    pub papers: usize,
    /// Collections re-parented to the survivor
    pub collections: usize,
    /// Saved searches re-parented to the survivor
    pub saved_searches: usize,
}

/// Trait for library storage operations (async)
#[allow(async_fn_in_trait)]
pub trait LibraryRepository {
    /// Insert a new library
    async fn create(&self, library: &Library) -> Result<()>;

    /// Get a library by ID
    async fn get(&self, id: &LibraryId) -> Result<Option<Library>>;

    /// List all libraries, oldest first
    async fn list(&self) -> Result<Vec<Library>>;

    /// Add a paper to a library (idempotent)
    async fn add_paper(&self, library_id: &LibraryId, paper_id: &PaperId) -> Result<()>;

    /// List the papers in a library
    async fn list_paper_ids(&self, library_id: &LibraryId) -> Result<Vec<PaperId>>;

    /// Count the papers in a library
    async fn count_papers(&self, library_id: &LibraryId) -> Result<usize>;

    /// Insert a new collection
    async fn create_collection(&self, collection: &Collection) -> Result<()>;

    /// List the collections in a library
    async fn list_collections(&self, library_id: &LibraryId) -> Result<Vec<Collection>>;

    /// Insert a new saved search
    async fn create_saved_search(&self, search: &SavedSearch) -> Result<()>;

    /// List the saved searches in a library
    async fn list_saved_searches(&self, library_id: &LibraryId) -> Result<Vec<SavedSearch>>;

    /// Merge duplicate libraries into a survivor, atomically
    ///
    /// Re-parents paper memberships (without duplicating ones the survivor
    /// already has), collections, and saved searches, then deletes the
    /// losing libraries. Runs in a single transaction: a failure leaves
    /// the corpus untouched.
    async fn merge_cluster(
        &self,
        survivor: &LibraryId,
        losers: &[LibraryId],
    ) -> Result<MigrationCounts>;
}

/// libSQL implementation of `LibraryRepository`
pub struct LibSqlLibraryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLibraryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_library(row: &libsql::Row) -> Result<Library> {
        let id: String = row.get(0)?;
        Ok(Library {
            id: id
                .parse()
                .map_err(|_| Error::InvalidInput("Invalid library ID".into()))?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            is_system: row.get::<i32>(3)? != 0,
            is_local_only: row.get::<i32>(4)? != 0,
        })
    }

    async fn merge_cluster_inner(
        &self,
        survivor: &LibraryId,
        losers: &[LibraryId],
    ) -> Result<MigrationCounts> {
        let mut counts = MigrationCounts::default();

        for loser in losers {
            // Memberships the survivor already has are skipped, then the
            // leftover duplicate rows are swept away.
            let moved = self
                .conn
                .execute(
                    "UPDATE OR IGNORE library_papers SET library_id = ? WHERE library_id = ?",
                    [survivor.as_str(), loser.as_str()],
                )
                .await?;
            self.conn
                .execute(
                    "DELETE FROM library_papers WHERE library_id = ?",
                    [loser.as_str()],
                )
                .await?;

            let collections = self
                .conn
                .execute(
                    "UPDATE collections SET library_id = ? WHERE library_id = ?",
                    [survivor.as_str(), loser.as_str()],
                )
                .await?;
            let searches = self
                .conn
                .execute(
                    "UPDATE saved_searches SET library_id = ? WHERE library_id = ?",
                    [survivor.as_str(), loser.as_str()],
                )
                .await?;

            self.conn
                .execute("DELETE FROM libraries WHERE id = ?", [loser.as_str()])
                .await?;

            counts.papers += usize::try_from(moved).unwrap_or_default();
            counts.collections += usize::try_from(collections).unwrap_or_default();
            counts.saved_searches += usize::try_from(searches).unwrap_or_default();
        }

        Ok(counts)
    }
}

impl LibraryRepository for LibSqlLibraryRepository<'_> {
    async fn create(&self, library: &Library) -> Result<()> {
        if library.name.trim().is_empty() {
            return Err(Error::InvalidInput("Library name cannot be empty".into()));
        }

        self.conn
            .execute(
                "INSERT INTO libraries (id, name, created_at, is_system, is_local_only)
                 VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    library.id.as_str(),
                    library.name.clone(),
                    library.created_at,
                    i32::from(library.is_system),
                    i32::from(library.is_local_only),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &LibraryId) -> Result<Option<Library>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, created_at, is_system, is_local_only
                 FROM libraries WHERE id = ?",
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_library(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Library>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, created_at, is_system, is_local_only
                 FROM libraries
                 ORDER BY created_at ASC, id ASC",
                (),
            )
            .await?;

        let mut libraries = Vec::new();
        while let Some(row) = rows.next().await? {
            libraries.push(Self::parse_library(&row)?);
        }
        Ok(libraries)
    }

    async fn add_paper(&self, library_id: &LibraryId, paper_id: &PaperId) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO library_papers (library_id, paper_id) VALUES (?, ?)",
                [library_id.as_str(), paper_id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn list_paper_ids(&self, library_id: &LibraryId) -> Result<Vec<PaperId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT paper_id FROM library_papers WHERE library_id = ? ORDER BY paper_id",
                [library_id.as_str()],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            ids.push(
                id.parse()
                    .map_err(|_| Error::InvalidInput("Invalid paper ID".into()))?,
            );
        }
        Ok(ids)
    }

    async fn count_papers(&self, library_id: &LibraryId) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM library_papers WHERE library_id = ?",
                [library_id.as_str()],
            )
            .await?;

        let count: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            0
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn create_collection(&self, collection: &Collection) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO collections (id, library_id, name, created_at) VALUES (?, ?, ?, ?)",
                libsql::params![
                    collection.id.as_str(),
                    collection.library_id.as_str(),
                    collection.name.clone(),
                    collection.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_collections(&self, library_id: &LibraryId) -> Result<Vec<Collection>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, library_id, name, created_at
                 FROM collections WHERE library_id = ?
                 ORDER BY created_at ASC",
                [library_id.as_str()],
            )
            .await?;

        let mut collections = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let library: String = row.get(1)?;
            collections.push(Collection {
                id: id
                    .parse()
                    .map_err(|_| Error::InvalidInput("Invalid collection ID".into()))?,
                library_id: library
                    .parse()
                    .map_err(|_| Error::InvalidInput("Invalid library ID".into()))?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            });
        }
        Ok(collections)
    }

    async fn create_saved_search(&self, search: &SavedSearch) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO saved_searches (id, library_id, name, query, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    search.id.as_str(),
                    search.library_id.as_str(),
                    search.name.clone(),
                    search.query.clone(),
                    search.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_saved_searches(&self, library_id: &LibraryId) -> Result<Vec<SavedSearch>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, library_id, name, query, created_at
                 FROM saved_searches WHERE library_id = ?
                 ORDER BY created_at ASC",
                [library_id.as_str()],
            )
            .await?;

        let mut searches = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let library: String = row.get(1)?;
            searches.push(SavedSearch {
                id: id
                    .parse()
                    .map_err(|_| Error::InvalidInput("Invalid saved search ID".into()))?,
                library_id: library
                    .parse()
                    .map_err(|_| Error::InvalidInput("Invalid library ID".into()))?,
                name: row.get(2)?,
                query: row.get(3)?,
                created_at: row.get(4)?,
            });
        }
        Ok(searches)
    }

    async fn merge_cluster(
        &self,
        survivor: &LibraryId,
        losers: &[LibraryId],
    ) -> Result<MigrationCounts> {
        if losers.contains(survivor) {
            return Err(Error::InvalidInput(
                "Survivor cannot be among the merged libraries".into(),
            ));
        }
        if losers.is_empty() {
            return Ok(MigrationCounts::default());
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.merge_cluster_inner(survivor, losers).await {
            Ok(counts) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(counts)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlPaperRepository, PaperRepository};
    use crate::models::Paper;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_list_round_trip() {
        let db = setup().await;
        let repo = LibSqlLibraryRepository::new(db.connection());

        let library = Library::new("Reading Group");
        repo.create(&library).await.unwrap();

        let listed = repo.list().await.unwrap();
        // The bootstrapped default library is always present.
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|l| l.id == library.id));
        assert!(listed.iter().any(|l| l.id == Library::DEFAULT_ID));

        let loaded = repo.get(&library.id).await.unwrap().unwrap();
        assert_eq!(loaded, library);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_paper_is_idempotent() {
        let db = setup().await;
        let libraries = LibSqlLibraryRepository::new(db.connection());
        let papers = LibSqlPaperRepository::new(db.connection());

        let paper = Paper::new("smith2023");
        papers.create(&paper).await.unwrap();

        libraries
            .add_paper(&Library::DEFAULT_ID, &paper.id)
            .await
            .unwrap();
        libraries
            .add_paper(&Library::DEFAULT_ID, &paper.id)
            .await
            .unwrap();

        assert_eq!(libraries.count_papers(&Library::DEFAULT_ID).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_merge_cluster_migrates_everything() {
        let db = setup().await;
        let libraries = LibSqlLibraryRepository::new(db.connection());
        let papers = LibSqlPaperRepository::new(db.connection());

        let survivor = Library::new("ML Papers");
        let loser = Library::new("ml papers");
        libraries.create(&survivor).await.unwrap();
        libraries.create(&loser).await.unwrap();

        let shared = Paper::new("shared2023");
        let only_loser = Paper::new("lost2023");
        papers.create(&shared).await.unwrap();
        papers.create(&only_loser).await.unwrap();

        libraries.add_paper(&survivor.id, &shared.id).await.unwrap();
        libraries.add_paper(&loser.id, &shared.id).await.unwrap();
        libraries.add_paper(&loser.id, &only_loser.id).await.unwrap();

        let collection = Collection::new(loser.id, "To Read");
        libraries.create_collection(&collection).await.unwrap();
        let search = SavedSearch::new(loser.id, "Recent", "year:2023");
        libraries.create_saved_search(&search).await.unwrap();

        let counts = libraries
            .merge_cluster(&survivor.id, &[loser.id])
            .await
            .unwrap();

        // The shared membership already existed, so only one paper moved.
        assert_eq!(counts.papers, 1);
        assert_eq!(counts.collections, 1);
        assert_eq!(counts.saved_searches, 1);

        assert_eq!(libraries.count_papers(&survivor.id).await.unwrap(), 2);
        assert!(libraries.get(&loser.id).await.unwrap().is_none());
        assert_eq!(
            libraries.list_collections(&survivor.id).await.unwrap()[0].name,
            "To Read"
        );
        assert_eq!(
            libraries.list_saved_searches(&survivor.id).await.unwrap()[0].name,
            "Recent"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_merge_cluster_rejects_survivor_among_losers() {
        let db = setup().await;
        let libraries = LibSqlLibraryRepository::new(db.connection());

        let library = Library::new("ML Papers");
        libraries.create(&library).await.unwrap();

        assert!(libraries
            .merge_cluster(&library.id, &[library.id])
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_merge_cluster_with_no_losers_is_noop() {
        let db = setup().await;
        let libraries = LibSqlLibraryRepository::new(db.connection());

        let counts = libraries
            .merge_cluster(&Library::DEFAULT_ID, &[])
            .await
            .unwrap();
        assert_eq!(counts, MigrationCounts::default());
    }
}
