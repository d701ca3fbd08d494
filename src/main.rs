use anyhow::{Context, Result};
use clap::Parser;
use reqtime::cli::{Cli, OutputFormat};
use reqtime::config::{TrackerConfig, TrackerSettings};
use reqtime::scenario::{run_scenario, Scenario};
use reqtime::RequestTracker;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; tracker output goes to stderr
///
/// `RUST_LOG` wins when set; otherwise INFO. `--debug` adds TRACE on top.
fn init_tracing(debug: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if debug {
        filter = filter.add_directive(tracing::Level::TRACE.into());
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

/// Settings file (if any), then REQTIME_* environment overrides
fn load_settings(path: Option<&Path>) -> Result<TrackerSettings> {
    let settings = match path {
        Some(path) => TrackerSettings::from_file(path)?,
        None => TrackerSettings::default(),
    };
    Ok(settings.apply_env()?)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let mut settings = load_settings(args.config.as_deref())?;
    if args.verbose {
        settings.verbose = true;
    }

    let config = TrackerConfig::default()
        .with_settings(&settings)
        .on_end_request(|data| {
            tracing::debug!(
                session_id = %data.id,
                total_elapsed_ms = ?data.total_elapsed_ms,
                events = data.events.len(),
                "request finished"
            );
        });
    let tracker = RequestTracker::new(config);

    let scenario = Scenario::from_file(&args.scenario)?;
    let outcome = run_scenario(&tracker, &scenario, std::thread::sleep)
        .with_context(|| format!("Failed to replay {}", args.scenario.display()))?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.data)?),
        OutputFormat::Text => println!("{}", outcome.data),
        OutputFormat::ServerTiming => println!("{}", outcome.data.server_timing()),
    }

    Ok(())
}
