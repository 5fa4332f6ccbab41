use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use shelfmark_core::db::SyncConfig;
use shelfmark_core::models::SyncConflict;
use shelfmark_core::services::DatabaseService;
use shelfmark_core::util::normalize_library_name;
use shelfmark_core::{Library, Paper, PaperId};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct PaperListItem {
    pub id: String,
    pub citekey: String,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub read: bool,
    pub updated_at: i64,
    pub relative_time: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub paper_id: String,
    pub field: String,
    pub local_ts: i64,
    pub incoming_ts: i64,
    pub winner: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
}

pub async fn list_papers(limit: usize, db_path: &Path) -> Result<Vec<Paper>, CliError> {
    let db = open_database(db_path).await?;
    Ok(db.list_papers(limit, 0).await?)
}

pub async fn list_sync_conflicts(
    limit: usize,
    db_path: &Path,
) -> Result<Vec<SyncConflict>, CliError> {
    let db = open_database(db_path).await?;
    Ok(db.list_sync_conflicts(limit).await?)
}

/// Resolve a paper by id first, then by citekey
pub async fn resolve_paper(query: &str, db: &DatabaseService) -> Result<Paper, CliError> {
    if let Ok(paper_id) = query.parse::<PaperId>() {
        if let Some(paper) = db.get_paper(&paper_id).await? {
            return Ok(paper);
        }
    }

    db.get_paper_by_citekey(query)
        .await?
        .ok_or_else(|| CliError::PaperNotFound(query.to_string()))
}

pub async fn find_library_by_name(
    db: &DatabaseService,
    name: &str,
) -> Result<Library, CliError> {
    let needle = normalize_library_name(name);
    db.list_libraries()
        .await?
        .into_iter()
        .find(|library| normalize_library_name(&library.name) == needle)
        .ok_or_else(|| CliError::LibraryNotFound(name.to_string()))
}

pub fn format_paper_lines(papers: &[Paper]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    papers
        .iter()
        .map(|paper| {
            let year = paper.year.map_or_else(|| "-".to_string(), |y| y.to_string());
            let title = paper_title_preview(paper, 48);
            let relative_time = format_relative_time(paper.updated_at, now_ms);
            let tags = render_tags(paper);
            let citekey = &paper.citekey;

            if tags.is_empty() {
                format!("{citekey:<20}  {year:<5}  {title:<48}  {relative_time}")
            } else {
                format!("{citekey:<20}  {year:<5}  {title:<48}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn paper_to_list_item(paper: &Paper) -> PaperListItem {
    let now_ms = Utc::now().timestamp_millis();

    PaperListItem {
        id: paper.id.to_string(),
        citekey: paper.citekey.clone(),
        title: paper.title.clone(),
        year: paper.year,
        doi: paper.doi.clone(),
        arxiv_id: paper.arxiv_id.clone(),
        read: paper.read,
        updated_at: paper.updated_at,
        relative_time: format_relative_time(paper.updated_at, now_ms),
        tags: paper.tags.iter().cloned().collect(),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        paper_id: conflict.paper_id.clone(),
        field: conflict.field.clone(),
        local_ts: conflict.local_ts,
        incoming_ts: conflict.incoming_ts,
        winner: conflict.winner.clone(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
    }
}

pub fn paper_title_preview(paper: &Paper, max_chars: usize) -> String {
    let title = paper.title.as_deref().unwrap_or("(untitled)").trim();
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(paper: &Paper) -> String {
    paper
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<8}  {:<14}  paper={}  local={} incoming={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.winner,
                conflict.field,
                conflict.paper_id,
                conflict.local_ts,
                conflict.incoming_ts
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_citekey(citekey: &str) -> Result<String, CliError> {
    let trimmed = citekey.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCitekey)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_paper_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyPaperId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SHELFMARK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelfmark")
        .join("shelfmark.db")
}

pub fn sync_config_from_env() -> Option<SyncConfig> {
    let url = env::var("SHELFMARK_SYNC_URL").ok()?;
    let auth_token = env::var("SHELFMARK_SYNC_TOKEN").ok()?;

    if url.is_empty() || auth_token.is_empty() {
        return None;
    }

    Some(SyncConfig::new(url, auth_token))
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    if let Some(sync_config) = sync_config_from_env() {
        tracing::info!("Sync enabled via environment");
        Ok(DatabaseService::open_sync_path(path.to_path_buf(), sync_config).await?)
    } else {
        Ok(DatabaseService::open_local_path(path.to_path_buf()).await?)
    }
}
