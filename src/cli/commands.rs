//! CLI subcommand definitions

use std::path::PathBuf;

use clap::Subcommand;

use crate::consts::{DEFAULT_WATCH_INTERVAL_SECS, MIN_WATCH_INTERVAL_SECS};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Show session window, weekly window and rolling totals (default)
    Report {
        /// Also write the snapshot document to this path
        #[arg(long, value_name = "FILE")]
        snapshot_output: Option<PathBuf>,
    },
    /// Write the snapshot document
    Snapshot {
        /// Destination (default: <codex_home>/usage_tracker/latest_snapshot.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Do not print the destination path
        #[arg(short, long)]
        quiet: bool,
        /// Print the document to stdout instead of writing it
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
    /// Output single line for statusline/tmux integration
    Statusline,
    /// Rewrite the snapshot document periodically
    Watch {
        /// Seconds between refreshes
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_WATCH_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(MIN_WATCH_INTERVAL_SECS..)
        )]
        interval: u64,
        /// Destination (default: <codex_home>/usage_tracker/latest_snapshot.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Stop after this many refreshes
        #[arg(long, value_name = "N")]
        runs: Option<u64>,
    },
}

/// The command to run; no subcommand means a plain report
pub(crate) fn parse_command(cmd: Option<Commands>) -> Commands {
    cmd.unwrap_or(Commands::Report {
        snapshot_output: None,
    })
}
