use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(about = "Manage a synced bibliographic library from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a paper to the library
    #[command(alias = "new")]
    Add(AddArgs),
    /// List recent papers
    List {
        /// Number of papers to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one paper in detail
    Show {
        /// Paper ID or citekey
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a paper
    Delete {
        /// Paper ID or citekey
        id: String,
    },
    /// Manage libraries
    Libraries {
        #[command(subcommand)]
        command: Option<LibraryCommands>,
    },
    /// Merge duplicate libraries and papers left behind by multi-device sync
    Dedup {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile incoming records and flush the local replica
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,

        /// Apply a JSON batch of incoming record snapshots
        #[arg(long, value_name = "PATH")]
        batch: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct AddArgs {
    /// Citation key, e.g. vaswani2017attention
    pub citekey: String,

    /// Paper title
    #[arg(long)]
    pub title: Option<String>,

    /// Publication year
    #[arg(long)]
    pub year: Option<i64>,

    /// DOI, e.g. 10.48550/arXiv.1706.03762
    #[arg(long)]
    pub doi: Option<String>,

    /// arXiv identifier, e.g. 1706.03762v5
    #[arg(long, value_name = "ID")]
    pub arxiv: Option<String>,

    /// Link to the paper
    #[arg(long)]
    pub url: Option<String>,

    /// Tag to attach (repeatable)
    #[arg(long = "tag", value_name = "NAME")]
    pub tags: Vec<String>,

    /// Library to file the paper under (default library when omitted)
    #[arg(long, value_name = "NAME")]
    pub library: Option<String>,
}

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// List libraries with their paper counts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new library
    Add {
        /// Library name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List recently resolved field conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
