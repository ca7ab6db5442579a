//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use qz_core::import::Tool;

/// Minimal time tracker.
///
/// Records what you work on as non-overlapping intervals in a local database.
/// Run without a subcommand to show the current status.
#[derive(Debug, Parser)]
#[command(name = "qz", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the database location and exit.
    #[arg(long)]
    pub locate: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Optional message and project for an activity.
#[derive(Debug, Clone, Default, Args)]
pub struct LabelArgs {
    /// What the activity is about.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Project the activity belongs to.
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start tracking a new activity.
    Start {
        #[command(flatten)]
        labels: LabelArgs,

        /// Start time (default: now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Stop the running activity.
    Stop {
        #[command(flatten)]
        labels: LabelArgs,

        /// Stop time (default: now).
        #[arg(long)]
        at: Option<String>,

        /// Delete the running activity instead of recording it.
        #[arg(long, conflicts_with_all = ["message", "project", "at"])]
        discard: bool,
    },

    /// Record a finished activity.
    Add {
        #[command(flatten)]
        labels: LabelArgs,

        /// Start time.
        start: String,

        /// Stop time.
        stop: String,
    },

    /// Show recorded activities grouped by day.
    Log {
        /// Earliest time to include (default: midnight a week ago).
        #[arg(long)]
        since: Option<String>,

        /// Latest time to include (default: now).
        #[arg(long)]
        until: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete an activity by identifier prefix.
    Delete {
        /// Unambiguous prefix of the activity identifier.
        id: String,
    },

    /// Import activities exported by another tool.
    Import {
        /// Tool that produced the export.
        #[arg(short, long)]
        tool: Tool,

        /// Path to the export file.
        file: PathBuf,
    },
}
