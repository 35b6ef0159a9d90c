//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: submit a job file and orchestrate it to completion
//! - validate: parse a job file without running it
//! - workers: show the configured worker pool

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dispatchr - capability-matched task orchestration for LLM workers
#[derive(Parser, Debug)]
#[command(name = "dispatchr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit tasks from a job file and run them to completion
    Run {
        /// Path to a YAML job file with a `tasks` list
        jobs: PathBuf,
    },

    /// Parse a job file and show what would be submitted
    Validate {
        /// Path to a YAML job file with a `tasks` list
        jobs: PathBuf,
    },

    /// Show the configured worker pool and capabilities
    Workers,
}
