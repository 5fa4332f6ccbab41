use std::path::Path;

use crate::commands::common::{normalize_paper_identifier, open_database, resolve_paper};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_paper_identifier(id)?;
    let db = open_database(db_path).await?;
    let paper = resolve_paper(&normalized_id, &db).await?;

    db.delete_paper(&paper.id).await?;
    println!("{}", paper.id);
    Ok(())
}
