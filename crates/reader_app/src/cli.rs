use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reader_logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "reader", version, about = "Offline e-book reader")]
pub struct Cli {
    /// Directory holding progress records, the library index and the log.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// RON config file. Defaults to `reader.ron` in the working directory if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Where log output goes: file, terminal or both.
    #[arg(long, global = true, default_value = "file", value_parser = parse_destination)]
    pub log: LogDestination,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open a book and read it interactively.
    Open {
        path: PathBuf,
        /// Characters per page.
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Add books to the library without opening them.
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove a book and its reading progress.
    Remove { path: PathBuf },
    /// List the library, most recently read first.
    Library,
    /// Show the stored reading position of a book.
    Progress { path: PathBuf },
}

fn parse_destination(value: &str) -> Result<LogDestination, String> {
    LogDestination::from_name(value)
        .ok_or_else(|| format!("unknown log destination `{value}` (file, terminal, both)"))
}
