use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the process-wide subscriber once, for the daemon's whole
/// lifetime. Unlike `datadog-log`'s reloadable layer/filter handles
/// (built for an FFI-embedded library whose host can reconfigure logging at
/// runtime), `conduitd` is a single long-lived process with nothing else
/// reaching in to reconfigure it, so a single non-reloadable `fmt` layer is
/// enough.
pub fn init(filter: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
