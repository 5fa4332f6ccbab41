use std::path::Path;

use shelfmark_core::models::{FieldValue, ScalarField};
use shelfmark_core::sync::ConflictDetector;
use shelfmark_core::util::normalize_text_option;
use shelfmark_core::{Library, Paper};

use crate::cli::AddArgs;
use crate::commands::common::{find_library_by_name, normalize_citekey, open_database};
use crate::error::CliError;

pub async fn run_add(args: &AddArgs, db_path: &Path) -> Result<(), CliError> {
    let citekey = normalize_citekey(&args.citekey)?;

    let db = open_database(db_path).await?;
    let mut paper = Paper::new(citekey);

    // Blank flag values are treated as absent so they never get stamped.
    if let Some(title) = normalize_text_option(args.title.clone()) {
        paper.set_field(ScalarField::Title, FieldValue::Text(title));
    }
    if let Some(year) = args.year {
        paper.set_field(ScalarField::Year, FieldValue::Integer(year));
    }
    if let Some(doi) = normalize_text_option(args.doi.clone()) {
        paper.set_field(ScalarField::Doi, FieldValue::Text(doi));
    }
    if let Some(arxiv_id) = normalize_text_option(args.arxiv.clone()) {
        paper.set_field(ScalarField::ArxivId, FieldValue::Text(arxiv_id));
    }
    if let Some(url) = normalize_text_option(args.url.clone()) {
        paper.set_field(ScalarField::Url, FieldValue::Text(url));
    }
    for tag in &args.tags {
        paper.add_tag(tag.clone());
    }

    let detector = ConflictDetector::new(db.clone());
    if detector
        .detect_citekey_conflict(&paper.citekey, &paper.id)
        .await?
        .is_some()
    {
        return Err(CliError::CitekeyTaken(paper.citekey));
    }
    if let Some(existing) = detector
        .find_duplicate(paper.doi.as_deref(), paper.arxiv_id.as_deref())
        .await?
    {
        return Err(CliError::DuplicatePaper(existing.citekey));
    }

    let library_id = match &args.library {
        Some(name) => find_library_by_name(&db, name).await?.id,
        None => Library::DEFAULT_ID,
    };

    db.create_paper(&paper).await?;
    db.add_paper_to_library(&library_id, &paper.id).await?;

    println!("{}", paper.id);
    Ok(())
}
