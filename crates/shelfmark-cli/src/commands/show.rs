use std::path::Path;

use shelfmark_core::Paper;

use crate::commands::common::{
    format_sync_timestamp, normalize_paper_identifier, open_database, render_tags, resolve_paper,
};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_paper_identifier(id)?;
    let db = open_database(db_path).await?;
    let paper = resolve_paper(&normalized_id, &db).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&paper)?);
        return Ok(());
    }

    for line in format_paper_detail(&paper) {
        println!("{line}");
    }
    Ok(())
}

fn format_paper_detail(paper: &Paper) -> Vec<String> {
    let mut lines = vec![
        format!("id:        {}", paper.id),
        format!("citekey:   {}", paper.citekey),
    ];

    if let Some(title) = &paper.title {
        lines.push(format!("title:     {title}"));
    }
    if let Some(year) = paper.year {
        lines.push(format!("year:      {year}"));
    }
    if let Some(doi) = &paper.doi {
        lines.push(format!("doi:       {doi}"));
    }
    if let Some(arxiv_id) = &paper.arxiv_id {
        lines.push(format!("arxiv:     {arxiv_id}"));
    }
    if let Some(url) = &paper.url {
        lines.push(format!("url:       {url}"));
    }
    if let Some(abstract_text) = &paper.abstract_text {
        lines.push(format!("abstract:  {abstract_text}"));
    }

    lines.push(format!(
        "read:      {}",
        if paper.read { "yes" } else { "no" }
    ));
    lines.push(format!("citations: {}", paper.citation_count));

    if !paper.tags.is_empty() {
        lines.push(format!("tags:      {}", render_tags(paper)));
    }

    lines.push(format!(
        "created:   {}",
        format_sync_timestamp(paper.created_at)
    ));
    lines.push(format!(
        "updated:   {}",
        format_sync_timestamp(paper.updated_at)
    ));

    // Which fields carry explicit edit stamps, i.e. participate in
    // last-writer-wins when this paper next merges.
    if !paper.field_timestamps.is_empty() {
        let stamped = paper
            .field_timestamps
            .iter()
            .map(|(field, _)| field.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        lines.push(format!("stamped:   {stamped}"));
    }

    lines
}
