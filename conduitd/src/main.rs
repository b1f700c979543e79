//! `conduitd`'s entrypoint: parses the CLI, initializes logging, loads and
//! validates the pipeline's TOML config, builds and runs the coordinator
//! until a shutdown signal, then stops it in reverse order.
//!
//! Concrete Input/Decoder/Filter/Output plugin bodies are out of scope;
//! this binary wires an empty constructor registry, the way
//! `ddtelemetry`'s `examples/tm-worker-test.rs` wires one hardcoded worker
//! rather than a pluggable graph. A config that names plugins without a
//! matching embedder-supplied registry fails fast at startup with
//! `CoreError::MissingConstructor`, exactly as it would for any other
//! caller of `conduit_core::Coordinator::build`.

mod cli;
mod logging;
mod signals;

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use conduit_core::{Config, Coordinator, Settings};
use conduit_supervisor::PluginConstructor;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    let log_filter = cli.log_filter.clone().unwrap_or_else(|| settings.log_filter.clone());
    logging::init(&log_filter)?;

    let raw_toml = tokio::fs::read_to_string(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("reading config {}: {e}", cli.config.display()))?;
    let config = Config::from_toml_str(&raw_toml)
        .map_err(|e| anyhow::anyhow!("invalid pipeline config: {e}"))?;

    let coordinator = Coordinator::build(
        config,
        |_pool| HashMap::<String, PluginConstructor>::new(),
        settings.shutdown_grace,
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to start pipeline: {e}"))?;

    tracing::info!(config = %cli.config.display(), "conduitd started");

    let report_interval = Duration::from_secs(cli.report_interval_secs.max(1));
    let mut ticker = tokio::time::interval(report_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = coordinator.snapshot();
                tracing::info!(
                    supervisors = snapshot.supervisors.len(),
                    delivered = snapshot.router.delivered,
                    zero_match_drops = snapshot.router.zero_match_drops,
                    hop_limit_drops = snapshot.router.hop_limit_drops,
                    slow_supervisor_events = snapshot.router.slow_supervisor_events,
                    "pipeline reporting snapshot"
                );
            }
            _ = signals::shutdown_signal() => break,
        }
    }

    coordinator.shutdown().await;
    tracing::info!("conduitd stopped");
    Ok(())
}
