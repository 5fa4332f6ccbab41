use std::path::Path;

use serde::Serialize;
use shelfmark_core::Library;

use crate::commands::common::open_database;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct LibraryListItem {
    pub id: String,
    pub name: String,
    pub papers: usize,
    pub created_at: i64,
    pub is_system: bool,
    pub is_local_only: bool,
}

pub async fn run_list_libraries(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let libraries = db.list_libraries().await?;

    let mut items = Vec::with_capacity(libraries.len());
    for library in &libraries {
        let papers = db.count_library_papers(&library.id).await?;
        items.push(LibraryListItem {
            id: library.id.as_str(),
            name: library.name.clone(),
            papers,
            created_at: library.created_at,
            is_system: library.is_system,
            is_local_only: library.is_local_only,
        });
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            let papers = item.papers;
            let suffix = if papers == 1 { "paper" } else { "papers" };
            println!("{:<24}  {papers:>4} {suffix}  {}", item.name, item.id);
        }
    }

    Ok(())
}

pub async fn run_add_library(name: &str, db_path: &Path) -> Result<(), CliError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyLibraryName);
    }

    let db = open_database(db_path).await?;
    let library = Library::new(trimmed);
    db.create_library(&library).await?;

    println!("{}", library.id);
    Ok(())
}
