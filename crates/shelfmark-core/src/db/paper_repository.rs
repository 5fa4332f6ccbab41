//! Paper repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{FieldTimestamps, Paper, PaperId, SyncConflict, Tag, TagId};
use crate::util::{normalize_doi, strip_arxiv_version};
use libsql::Connection;
use std::collections::BTreeSet;

const PAPER_COLUMNS: &str = "id, citekey, title, year, abstract, doi, arxiv_id, url, \
     read, citation_count, created_at, updated_at, is_deleted, field_timestamps";

/// Trait for paper storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PaperRepository {
    /// Insert a new paper with its tags and collection memberships
    async fn create(&self, paper: &Paper) -> Result<()>;

    /// Get a paper by ID (excluding deleted)
    async fn get(&self, id: &PaperId) -> Result<Option<Paper>>;

    /// Get a paper by exact citekey (excluding deleted)
    async fn get_by_citekey(&self, citekey: &str) -> Result<Option<Paper>>;

    /// Find a paper matching either external identifier
    ///
    /// DOI comparison is case-insensitive; arXiv comparison ignores a
    /// trailing version suffix on both sides.
    async fn find_by_identifiers(
        &self,
        doi: Option<&str>,
        arxiv_id: Option<&str>,
    ) -> Result<Option<Paper>>;

    /// List papers (excluding deleted), most recently updated first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Paper>>;

    /// List every paper (excluding deleted), oldest first
    async fn list_all(&self) -> Result<Vec<Paper>>;

    /// Persist a paper's current state, including tags and memberships
    async fn update(&self, paper: &Paper) -> Result<()>;

    /// Fold duplicate papers into a survivor, atomically
    ///
    /// Re-parents library memberships (without duplicating ones the
    /// survivor already has), drops the duplicates' tag and collection
    /// links, deletes the duplicate rows, then persists the survivor's
    /// merged state. Runs in a single transaction: a failure leaves the
    /// corpus untouched. Returns the number of memberships moved.
    async fn merge_duplicates(&self, survivor: &Paper, duplicates: &[PaperId]) -> Result<usize>;

    /// Soft delete a paper
    async fn delete(&self, id: &PaperId) -> Result<()>;

    /// Append a resolved field conflict to the conflict log
    async fn record_conflict(
        &self,
        paper_id: &PaperId,
        field: &str,
        local_ts: i64,
        incoming_ts: i64,
        winner: &str,
    ) -> Result<()>;

    /// List recently resolved field conflicts
    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `PaperRepository`
pub struct LibSqlPaperRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPaperRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a paper from a database row (tags and memberships loaded separately)
    fn parse_paper(row: &libsql::Row) -> Result<Paper> {
        let id: String = row.get(0)?;
        let field_timestamps: String = row.get(13)?;
        Ok(Paper {
            id: id
                .parse()
                .map_err(|_| Error::InvalidInput("Invalid paper ID".into()))?,
            citekey: row.get(1)?,
            title: text_or_null(row, 2)?,
            year: integer_or_null(row, 3)?,
            abstract_text: text_or_null(row, 4)?,
            doi: text_or_null(row, 5)?,
            arxiv_id: text_or_null(row, 6)?,
            url: text_or_null(row, 7)?,
            read: row.get::<i32>(8)? != 0,
            citation_count: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            is_deleted: row.get::<i32>(12)? != 0,
            field_timestamps: FieldTimestamps::from_json(&field_timestamps),
            tags: BTreeSet::new(),
            collections: BTreeSet::new(),
        })
    }

    /// Attach tags and collection memberships to a parsed paper
    async fn hydrate(&self, mut paper: Paper) -> Result<Paper> {
        paper.tags = self.load_tags(&paper.id).await?;
        paper.collections = self.load_collections(&paper.id).await?;
        Ok(paper)
    }

    async fn load_tags(&self, paper_id: &PaperId) -> Result<BTreeSet<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT t.name FROM tags t
                 JOIN paper_tags pt ON pt.tag_id = t.id
                 WHERE pt.paper_id = ?",
                [paper_id.as_str()],
            )
            .await?;

        let mut tags = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            tags.insert(row.get(0)?);
        }
        Ok(tags)
    }

    async fn load_collections(
        &self,
        paper_id: &PaperId,
    ) -> Result<BTreeSet<crate::models::CollectionId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT collection_id FROM collection_papers WHERE paper_id = ?",
                [paper_id.as_str()],
            )
            .await?;

        let mut collections = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            collections.insert(
                id.parse()
                    .map_err(|_| Error::InvalidInput("Invalid collection ID".into()))?,
            );
        }
        Ok(collections)
    }

    /// Replace the paper's tag links with its current tag set
    async fn sync_tags(&self, paper: &Paper) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM paper_tags WHERE paper_id = ?",
                [paper.id.as_str()],
            )
            .await?;

        for name in &paper.tags {
            let tag_id = self.get_or_create_tag(name).await?;
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO paper_tags (paper_id, tag_id) VALUES (?, ?)",
                    [paper.id.as_str(), tag_id.as_str()],
                )
                .await?;
        }

        Ok(())
    }

    /// Replace the paper's collection memberships with its current set
    async fn sync_collections(&self, paper: &Paper) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM collection_papers WHERE paper_id = ?",
                [paper.id.as_str()],
            )
            .await?;

        for collection in &paper.collections {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO collection_papers (collection_id, paper_id) VALUES (?, ?)",
                    [collection.as_str(), paper.id.as_str()],
                )
                .await?;
        }

        Ok(())
    }

    async fn merge_duplicates_inner(
        &self,
        survivor: &Paper,
        duplicates: &[PaperId],
    ) -> Result<usize> {
        let mut memberships = 0usize;

        for duplicate in duplicates {
            // Memberships the survivor already has are skipped, then the
            // leftover duplicate rows are swept away.
            let moved = self
                .conn
                .execute(
                    "UPDATE OR IGNORE library_papers SET paper_id = ? WHERE paper_id = ?",
                    [survivor.id.as_str(), duplicate.as_str()],
                )
                .await?;
            self.conn
                .execute(
                    "DELETE FROM library_papers WHERE paper_id = ?",
                    [duplicate.as_str()],
                )
                .await?;
            self.conn
                .execute(
                    "DELETE FROM paper_tags WHERE paper_id = ?",
                    [duplicate.as_str()],
                )
                .await?;
            self.conn
                .execute(
                    "DELETE FROM collection_papers WHERE paper_id = ?",
                    [duplicate.as_str()],
                )
                .await?;
            self.conn
                .execute("DELETE FROM papers WHERE id = ?", [duplicate.as_str()])
                .await?;

            memberships += usize::try_from(moved).unwrap_or_default();
        }

        // The duplicates' citekeys are free now, so the survivor can keep
        // whichever key won the merge.
        self.update(survivor).await?;
        Ok(memberships)
    }

    /// Get or create a tag by name
    async fn get_or_create_tag(&self, name: &str) -> Result<TagId> {
        let mut rows = self
            .conn
            .query("SELECT id FROM tags WHERE name = ? COLLATE NOCASE", [name])
            .await?;

        if let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            return id
                .parse()
                .map_err(|_| Error::InvalidInput("Invalid tag ID".into()));
        }

        let tag = Tag::new(name);
        self.conn
            .execute(
                "INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)",
                libsql::params![tag.id.as_str(), tag.name.clone(), tag.created_at],
            )
            .await?;

        Ok(tag.id)
    }
}

impl PaperRepository for LibSqlPaperRepository<'_> {
    async fn create(&self, paper: &Paper) -> Result<()> {
        if paper.citekey.trim().is_empty() {
            return Err(Error::InvalidInput("Citekey cannot be empty".into()));
        }

        self.conn
            .execute(
                "INSERT INTO papers (id, citekey, title, year, abstract, doi, arxiv_id, url,
                 read, citation_count, created_at, updated_at, is_deleted, field_timestamps)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    paper.id.as_str(),
                    paper.citekey.clone(),
                    opt_text(paper.title.as_deref()),
                    opt_integer(paper.year),
                    opt_text(paper.abstract_text.as_deref()),
                    opt_text(paper.doi.as_deref()),
                    opt_text(paper.arxiv_id.as_deref()),
                    opt_text(paper.url.as_deref()),
                    i32::from(paper.read),
                    paper.citation_count,
                    paper.created_at,
                    paper.updated_at,
                    i32::from(paper.is_deleted),
                    paper.field_timestamps.to_json()?,
                ],
            )
            .await?;

        self.sync_tags(paper).await?;
        self.sync_collections(paper).await?;

        Ok(())
    }

    async fn get(&self, id: &PaperId) -> Result<Option<Paper>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PAPER_COLUMNS} FROM papers WHERE id = ? AND is_deleted = 0"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let paper = Self::parse_paper(&row)?;
                Ok(Some(self.hydrate(paper).await?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_citekey(&self, citekey: &str) -> Result<Option<Paper>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PAPER_COLUMNS} FROM papers WHERE citekey = ? AND is_deleted = 0"
                ),
                [citekey],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let paper = Self::parse_paper(&row)?;
                Ok(Some(self.hydrate(paper).await?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_identifiers(
        &self,
        doi: Option<&str>,
        arxiv_id: Option<&str>,
    ) -> Result<Option<Paper>> {
        if let Some(doi) = doi {
            let normalized = normalize_doi(doi);
            if !normalized.is_empty() {
                let mut rows = self
                    .conn
                    .query(
                        &format!(
                            "SELECT {PAPER_COLUMNS} FROM papers
                             WHERE is_deleted = 0 AND doi IS NOT NULL
                               AND lower(trim(doi)) = ?
                             LIMIT 1"
                        ),
                        [normalized],
                    )
                    .await?;
                if let Some(row) = rows.next().await? {
                    let paper = Self::parse_paper(&row)?;
                    return Ok(Some(self.hydrate(paper).await?));
                }
            }
        }

        if let Some(arxiv_id) = arxiv_id {
            let base = strip_arxiv_version(arxiv_id);
            if !base.is_empty() {
                // Stored ids may carry a version suffix the probe lacks.
                let versioned = format!("{base}v%");
                let mut rows = self
                    .conn
                    .query(
                        &format!(
                            "SELECT {PAPER_COLUMNS} FROM papers
                             WHERE is_deleted = 0 AND arxiv_id IS NOT NULL
                               AND (lower(trim(arxiv_id)) = ?
                                    OR lower(trim(arxiv_id)) LIKE ?)
                             LIMIT 1"
                        ),
                        [base, versioned],
                    )
                    .await?;
                if let Some(row) = rows.next().await? {
                    let paper = Self::parse_paper(&row)?;
                    return Ok(Some(self.hydrate(paper).await?));
                }
            }
        }

        Ok(None)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Paper>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PAPER_COLUMNS} FROM papers
                     WHERE is_deleted = 0
                     ORDER BY updated_at DESC
                     LIMIT ? OFFSET ?"
                ),
                [limit as i64, offset as i64],
            )
            .await?;

        let mut papers = Vec::new();
        while let Some(row) = rows.next().await? {
            papers.push(Self::parse_paper(&row)?);
        }

        let mut hydrated = Vec::with_capacity(papers.len());
        for paper in papers {
            hydrated.push(self.hydrate(paper).await?);
        }
        Ok(hydrated)
    }

    async fn list_all(&self) -> Result<Vec<Paper>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PAPER_COLUMNS} FROM papers
                     WHERE is_deleted = 0
                     ORDER BY created_at ASC, id ASC"
                ),
                (),
            )
            .await?;

        let mut papers = Vec::new();
        while let Some(row) = rows.next().await? {
            papers.push(Self::parse_paper(&row)?);
        }

        let mut hydrated = Vec::with_capacity(papers.len());
        for paper in papers {
            hydrated.push(self.hydrate(paper).await?);
        }
        Ok(hydrated)
    }

    async fn update(&self, paper: &Paper) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE papers SET citekey = ?, title = ?, year = ?, abstract = ?, doi = ?,
                 arxiv_id = ?, url = ?, read = ?, citation_count = ?, updated_at = ?,
                 is_deleted = ?, field_timestamps = ?
                 WHERE id = ?",
                libsql::params![
                    paper.citekey.clone(),
                    opt_text(paper.title.as_deref()),
                    opt_integer(paper.year),
                    opt_text(paper.abstract_text.as_deref()),
                    opt_text(paper.doi.as_deref()),
                    opt_text(paper.arxiv_id.as_deref()),
                    opt_text(paper.url.as_deref()),
                    i32::from(paper.read),
                    paper.citation_count,
                    paper.updated_at,
                    i32::from(paper.is_deleted),
                    paper.field_timestamps.to_json()?,
                    paper.id.as_str(),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(paper.id.to_string()));
        }

        self.sync_tags(paper).await?;
        self.sync_collections(paper).await?;

        Ok(())
    }

    async fn merge_duplicates(&self, survivor: &Paper, duplicates: &[PaperId]) -> Result<usize> {
        if duplicates.contains(&survivor.id) {
            return Err(Error::InvalidInput(
                "Survivor cannot be among the merged papers".into(),
            ));
        }
        if duplicates.is_empty() {
            return Ok(0);
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.merge_duplicates_inner(survivor, duplicates).await {
            Ok(memberships) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(memberships)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    async fn delete(&self, id: &PaperId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE papers SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
                libsql::params![now, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn record_conflict(
        &self,
        paper_id: &PaperId,
        field: &str,
        local_ts: i64,
        incoming_ts: i64,
        winner: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_conflicts (paper_id, field, local_ts, incoming_ts, winner, resolved_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                libsql::params![
                    paper_id.as_str(),
                    field,
                    local_ts,
                    incoming_ts,
                    winner,
                    chrono::Utc::now().timestamp_millis(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, paper_id, field, local_ts, incoming_ts, winner, resolved_at
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                [limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                paper_id: row.get(1)?,
                field: row.get(2)?,
                local_ts: row.get(3)?,
                incoming_ts: row.get(4)?,
                winner: row.get(5)?,
                resolved_at: row.get(6)?,
            });
        }
        Ok(conflicts)
    }
}

fn text_or_null(row: &libsql::Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        libsql::Value::Text(v) => Ok(Some(v)),
        _ => Ok(None),
    }
}

fn integer_or_null(row: &libsql::Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        libsql::Value::Integer(v) => Ok(Some(v)),
        _ => Ok(None),
    }
}

fn opt_text(value: Option<&str>) -> libsql::Value {
    value.map_or(libsql::Value::Null, |v| libsql::Value::Text(v.to_string()))
}

fn opt_integer(value: Option<i64>) -> libsql::Value {
    value.map_or(libsql::Value::Null, libsql::Value::Integer)
}
