// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::StrategyKind;

/// Command-line arguments for `sweepdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sweepdag",
    version,
    about = "Run a sweep of dependent shell jobs, retrying the parts that fail.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the sweep file (TOML).
    ///
    /// Default: `Sweep.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Parse + validate, print the execution plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[executor].strategy` (cooperative, pool, parallel).
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<StrategyKind>,

    /// Override `[executor].workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Override `[executor].retries` (maximum number of passes).
    #[arg(long, value_name = "N")]
    pub retries: Option<usize>,

    /// Stop each pass at its first failure.
    #[arg(long)]
    pub raise_errors: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SWEEPDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
