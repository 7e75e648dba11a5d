// CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Collect, forward and report test invocation results
#[derive(Parser, Debug)]
#[command(name = "tradefed-report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay recorded test invocations through result reporters", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines event log through the configured reporters
    Replay(ReplayArgs),

    /// Show the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReplayArgs {
    /// Event log, one JSON event per line
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Sum numeric run metrics when a run name repeats
    #[arg(long, default_value_t = false)]
    pub aggregate_metrics: bool,

    /// Write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write a JUnit XML report to this path
    #[arg(long, value_name = "PATH")]
    pub junit: Option<PathBuf>,

    /// Save test_log data under this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Mail a summary to this address (repeatable)
    #[arg(long = "email-to", value_name = "ADDR")]
    pub email_to: Vec<String>,

    /// Mailbox file that notifications are appended to
    #[arg(long, value_name = "PATH")]
    pub outbox: Option<PathBuf>,

    /// Echo every event as a JSON line on stdout
    #[arg(long, default_value_t = false)]
    pub stream: bool,

    /// Do not print the console summary
    #[arg(short = 'q', long, default_value_t = false)]
    pub quiet: bool,
}
