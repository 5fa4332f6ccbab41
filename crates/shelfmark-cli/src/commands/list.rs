use std::path::Path;

use crate::commands::common::{format_paper_lines, list_papers, paper_to_list_item, PaperListItem};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let papers = list_papers(limit, db_path).await?;

    if as_json {
        let json_items = papers
            .iter()
            .map(paper_to_list_item)
            .collect::<Vec<PaperListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_paper_lines(&papers) {
            println!("{line}");
        }
    }

    Ok(())
}
