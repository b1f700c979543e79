use std::path::PathBuf;

use clap::Parser;

/// `conduitd` — the real-time telemetry pipeline daemon.
#[derive(Debug, Parser)]
#[command(name = "conduitd", version, about)]
pub struct Cli {
    /// Path to the pipeline's TOML configuration file.
    #[arg(short, long, default_value = "conduit.toml")]
    pub config: PathBuf,

    /// Overrides CONDUIT_LOG for this run.
    #[arg(long)]
    pub log_filter: Option<String>,

    /// How often to emit a reporting snapshot, in seconds.
    #[arg(long, default_value_t = 30)]
    pub report_interval_secs: u64,
}
