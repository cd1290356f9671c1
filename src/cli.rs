use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "diskwarden",
    about = "Find reclaimable disk space and remove it through a reversible quarantine",
    version
)]
pub struct Cli {
    /// Engine config file (JSON). Defaults to the per-user config if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log per-entry detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep quarantined files here instead of the configured directory
    #[arg(long, global = true)]
    pub quarantine_dir: Option<PathBuf>,

    /// Report user files at least this many bytes as large
    #[arg(long, global = true)]
    pub large_file_floor: Option<u64>,

    /// Stop walking a location after this many entries
    #[arg(long, global = true)]
    pub max_entries: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan the known locations (read-only)
    Scan {
        /// Also write every result to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Scan this directory instead of the catalog; results are never-auto
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Report which locations are readable, and roughly how large they are
    Probe,

    /// Scan, then move the approved results into quarantine
    Clean {
        /// Only clean one category (cache, temp, log, duplicate, large, trash)
        #[arg(long)]
        category: Option<String>,

        /// Only clean results marked auto-safe
        #[arg(long)]
        auto_safe_only: bool,

        /// Approve the listed results. Without this flag nothing is moved.
        #[arg(long)]
        yes: bool,
    },

    /// Inspect and manage quarantined files
    Quarantine {
        #[command(subcommand)]
        action: QuarantineCommand,
    },
}

#[derive(Subcommand)]
pub enum QuarantineCommand {
    /// List quarantined files and check their integrity
    List,

    /// Move a quarantined file back to where it came from
    Restore {
        /// Quarantine id, as shown by `quarantine list`
        id: String,
    },

    /// Permanently erase quarantined files (irreversible)
    Purge {
        /// Erase items quarantined at least this many days ago
        #[arg(long)]
        older_than: u64,

        /// Confirm the erase. Without this flag only a count is shown.
        #[arg(long)]
        yes: bool,
    },
}
