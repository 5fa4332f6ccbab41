use std::path::Path;

use shelfmark_core::events::EventBus;
use shelfmark_core::sync::{JsonBatchTransport, SyncService};

use crate::commands::common::{
    format_sync_conflict_lines, list_sync_conflicts, open_database, sync_conflict_to_item,
    SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(batch: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    if let Some(batch_path) = batch {
        return run_batch_sync(batch_path, db_path).await;
    }

    let db = open_database(db_path).await?;
    if !db.is_sync_enabled().await {
        return Err(CliError::SyncNotConfigured);
    }

    db.sync().await?;
    println!("Sync completed");
    Ok(())
}

async fn run_batch_sync(batch_path: &Path, db_path: &Path) -> Result<(), CliError> {
    if !batch_path.exists() {
        return Err(CliError::BatchNotFound(batch_path.display().to_string()));
    }

    let db = open_database(db_path).await?;
    let transport = JsonBatchTransport::new(batch_path);
    let service = SyncService::new(db, transport, EventBus::default());
    let report = service.sync().await?;

    println!(
        "Applied {} record(s): {} inserted, {} merged, {} renamed, {} conflict(s) logged",
        report.applied, report.inserted, report.merged, report.renamed, report.conflicts
    );
    if report.cancelled {
        println!("Sync cancelled before completing the batch");
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let conflicts = list_sync_conflicts(limit, db_path).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
