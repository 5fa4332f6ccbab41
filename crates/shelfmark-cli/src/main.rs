//! Shelfmark CLI - Manage a synced bibliographic library
//!
//! Add and browse papers locally, replay batches of incoming record
//! snapshots, and inspect how field conflicts were resolved.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, LibraryCommands, SyncCommands};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelfmark_core=info".parse().unwrap())
                .add_directive("shelfmark_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Add(args)) => commands::add::run_add(&args, &db_path).await?,
        Some(Commands::List { limit, json }) => {
            commands::list::run_list(limit, json, &db_path).await?;
        }
        Some(Commands::Show { id, json }) => commands::show::run_show(&id, json, &db_path).await?,
        Some(Commands::Delete { id }) => commands::delete::run_delete(&id, &db_path).await?,
        Some(Commands::Libraries { command }) => match command {
            Some(LibraryCommands::Add { name }) => {
                commands::libraries::run_add_library(&name, &db_path).await?;
            }
            Some(LibraryCommands::List { json }) => {
                commands::libraries::run_list_libraries(json, &db_path).await?;
            }
            None => commands::libraries::run_list_libraries(false, &db_path).await?,
        },
        Some(Commands::Dedup { json }) => commands::dedup::run_dedup(json, &db_path).await?,
        Some(Commands::Sync { command, batch }) => match command {
            Some(SyncCommands::Conflicts { limit, json }) => {
                commands::sync::run_sync_conflicts(limit, json, &db_path).await?;
            }
            None => commands::sync::run_sync(batch.as_deref(), &db_path).await?,
        },
        Some(Commands::Completions { shell, output }) => {
            commands::completions::run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
