// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `mergequeue`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mergequeue",
    version,
    about = "Evaluate a batch of pull requests through a rate-limited merge queue.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `MergeQueue.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "MergeQueue.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MERGEQUEUE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the queue plan, but don't process any jobs.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum time to wait for the whole batch (e.g. "30s", "5m").
    #[arg(long, value_name = "DURATION", default_value = "5m")]
    pub timeout: String,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
