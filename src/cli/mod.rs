//! CLI module for dispatchr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running a job file
//! against the configured worker pool and validating job files offline.

pub mod commands;

pub use commands::Cli;
