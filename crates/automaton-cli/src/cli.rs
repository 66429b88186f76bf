//! CLI argument definitions for the `automaton` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run and inspect automation workflows.
#[derive(Parser)]
#[command(name = "automaton", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding `config.toml`, the audit log, and rollback backups.
    /// Defaults to the platform data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow file (YAML or JSON) to completion.
    Run {
        /// Path to the workflow definition file.
        file: PathBuf,

        /// Optional JSON object merged into the initial workflow context.
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the audit log recorded by the Permission Manager.
    Permissions {
        /// Only show entries for this action kind (e.g. `file_write`).
        #[arg(long)]
        action: Option<String>,

        /// Maximum number of entries to print (most recent last).
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// List rollback transactions recorded by the Rollback Manager.
    Rollback {
        #[command(subcommand)]
        action: RollbackCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum RollbackCommand {
    /// List recorded transactions.
    List {
        /// Only show committed (`true`) or only open/rolled-back (`false`) transactions.
        #[arg(long)]
        committed: Option<bool>,
    },

    /// Roll back a transaction by id.
    Apply {
        /// Transaction UUID.
        id: String,
    },
}
