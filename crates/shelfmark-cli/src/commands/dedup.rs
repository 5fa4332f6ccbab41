use std::path::Path;

use shelfmark_core::dedup::{
    DedupResult, LibraryDeduplicationService, PaperDedupResult, PaperDeduplicationService,
};
use shelfmark_core::events::EventBus;

use crate::commands::common::open_database;
use crate::error::CliError;

#[derive(serde::Serialize)]
struct DedupOutput {
    libraries: Vec<DedupResult>,
    papers: Vec<PaperDedupResult>,
}

pub async fn run_dedup(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let events = EventBus::default();

    let libraries = LibraryDeduplicationService::new(db.clone(), events.clone())
        .deduplicate_libraries()
        .await?;
    let papers = PaperDeduplicationService::new(db, events)
        .deduplicate_papers()
        .await?;

    if as_json {
        let output = DedupOutput { libraries, papers };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if libraries.is_empty() && papers.is_empty() {
        println!("No duplicates found.");
        return Ok(());
    }

    for result in &libraries {
        println!(
            "Merged {} duplicate(s) into '{}' ({} papers, {} collections, {} saved searches moved)",
            result.merged.len(),
            result.name,
            result.counts.papers,
            result.counts.collections,
            result.counts.saved_searches
        );
    }
    for result in &papers {
        println!(
            "Merged {} duplicate paper(s) into '{}' ({} memberships moved)",
            result.merged.len(),
            result.citekey,
            result.memberships
        );
    }
    Ok(())
}
