//! Database migrations

use crate::error::Result;
use crate::models::Library;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // Using a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Papers table; field_timestamps holds the per-field JSON map
        "CREATE TABLE IF NOT EXISTS papers (
            id TEXT PRIMARY KEY,
            citekey TEXT NOT NULL UNIQUE,
            title TEXT,
            year INTEGER,
            abstract TEXT,
            doi TEXT,
            arxiv_id TEXT,
            url TEXT,
            read INTEGER NOT NULL DEFAULT 0,
            citation_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            field_timestamps TEXT NOT NULL DEFAULT '{}'
        )",
        "CREATE INDEX IF NOT EXISTS idx_papers_updated ON papers(updated_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_papers_doi ON papers(doi)",
        "CREATE INDEX IF NOT EXISTS idx_papers_arxiv ON papers(arxiv_id)",
        "CREATE INDEX IF NOT EXISTS idx_papers_deleted ON papers(is_deleted)",
        // Tags table
        "CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at INTEGER NOT NULL
        )",
        // Paper-Tag junction table
        "CREATE TABLE IF NOT EXISTS paper_tags (
            paper_id TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (paper_id, tag_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_paper_tags_tag ON paper_tags(tag_id)",
        // Libraries; duplicate names may exist until a dedup pass merges them
        "CREATE TABLE IF NOT EXISTS libraries (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            is_system INTEGER NOT NULL DEFAULT 0,
            is_local_only INTEGER NOT NULL DEFAULT 0
        )",
        // Library-Paper membership
        "CREATE TABLE IF NOT EXISTS library_papers (
            library_id TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
            paper_id TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
            PRIMARY KEY (library_id, paper_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_library_papers_paper ON library_papers(paper_id)",
        // Collections live inside a library
        "CREATE TABLE IF NOT EXISTS collections (
            id TEXT PRIMARY KEY,
            library_id TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_collections_library ON collections(library_id)",
        // Collection membership; no FK on collection_id because a
        // membership can arrive from sync before its collection does
        "CREATE TABLE IF NOT EXISTS collection_papers (
            collection_id TEXT NOT NULL,
            paper_id TEXT NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
            PRIMARY KEY (collection_id, paper_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_collection_papers_paper ON collection_papers(paper_id)",
        // Saved searches live inside a library
        "CREATE TABLE IF NOT EXISTS saved_searches (
            id TEXT PRIMARY KEY,
            library_id TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            query TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_saved_searches_library ON saved_searches(library_id)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    // Bootstrap the default library with its well-known id
    let bootstrap = format!(
        "INSERT OR IGNORE INTO libraries (id, name, created_at, is_system, is_local_only)
         VALUES ('{}', '{}', CAST(strftime('%s','now') AS INTEGER) * 1000, 0, 0)",
        Library::DEFAULT_ID.as_str(),
        Library::DEFAULT_NAME,
    );
    if let Err(e) = conn.execute(&bootstrap, ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: Field-level conflict logging support
async fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            paper_id TEXT NOT NULL,
            field TEXT NOT NULL,
            local_ts INTEGER NOT NULL,
            incoming_ts INTEGER NOT NULL,
            winner TEXT NOT NULL,
            resolved_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_paper_id ON sync_conflicts(paper_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
