//! CLI argument parsing for reqtime

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the replayed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON session record (default)
    Json,
    /// Human-readable summary table
    Text,
    /// Server-Timing header value
    ServerTiming,
}

#[derive(Parser, Debug)]
#[command(name = "reqtime")]
#[command(version)]
#[command(about = "Replay scripted requests through the request timing tracker", long_about = None)]
pub struct Cli {
    /// Scenario file (TOML) describing the request, timing steps and response
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Tracker settings file (TOML); REQTIME_* environment variables override it
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log every stopped event as `<name>: (<ms>ms)`
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
