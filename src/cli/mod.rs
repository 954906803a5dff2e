//! tamiz CLI - filtered data loading from the command line.

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::{Mode, NormKind, SourceKind};

mod commands;

/// tamiz - load records through a filter
#[derive(Parser)]
#[command(name = "tamiz")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log loader activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a file through the configured filter and print the records
    Load {
        #[command(flatten)]
        loader: LoaderArgs,
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Print the filtered structure without reading records
    Schema {
        #[command(flatten)]
        loader: LoaderArgs,
    },
    /// List the supported source formats
    Formats,
}

/// Options describing how to build the loader.
///
/// Transform flags build a fixed pipeline regardless of their order on the
/// command line: select, drop, rename, normalize. A config file's transforms
/// run before all of them.
#[derive(Args, Debug, Default)]
pub(crate) struct LoaderArgs {
    /// Path to the data file
    path: PathBuf,
    /// Loader configuration file (JSON); flags below are applied on top
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Source format (default: by file extension)
    #[arg(short, long, value_enum)]
    source: Option<SourceKind>,
    /// Retrieval mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
    /// Keep only these columns (comma separated); applied first
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,
    /// Remove these columns (comma separated); applied after --select
    #[arg(long, value_delimiter = ',')]
    drop: Vec<String>,
    /// Rename a column, as old=new (repeatable); applied after --select and --drop,
    /// so those flags use the original names
    #[arg(long)]
    rename: Vec<String>,
    /// Normalize these numeric columns (comma separated); applied last, so
    /// renamed columns go by their new names
    #[arg(long, value_delimiter = ',')]
    normalize: Vec<String>,
    /// Normalization method
    #[arg(long, value_enum, default_value = "min-max")]
    norm_method: NormKind,
    /// Delimited text has no header row
    #[arg(long)]
    no_header: bool,
    /// Field delimiter of delimited text
    #[arg(short, long)]
    delimiter: Option<char>,
}

/// How loaded records are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Aligned text table
    Table,
    /// Comma-separated values with header
    Csv,
    /// One JSON object per line
    Json,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tamiz=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Run the tamiz CLI.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Load { loader, format } => commands::cmd_load(&loader, format),
        Commands::Schema { loader } => commands::cmd_schema(&loader),
        Commands::Formats => commands::cmd_formats(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
