use thiserror::Error;

/// Errors a plugin can report to its supervisor. The supervisor maps each
/// variant onto its own escalation rules: `Config` escalates straight to
/// the coordinator, everything else triggers restart evaluation.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin's configuration is invalid; not retryable. Escalates to
    /// the coordinator, which initiates orderly shutdown.
    #[error("plugin configuration rejected: {0}")]
    Config(String),
    /// An expected, internally-handled failure (a dropped connection, a
    /// timed-out remote call). Plugins should not normally return this —
    /// `Transient` errors are meant to be retried *inside* the plugin — but
    /// the variant exists so a plugin can still surface one for logging
    /// without it being treated as fatal.
    #[error("transient error: {0}")]
    Transient(String),
    /// An unrecoverable error from the plugin's run loop.
    #[error("plugin run loop failed: {0}")]
    Fatal(#[source] anyhow::Error),
}

impl PluginError {
    /// Whether this error should trigger supervisor restart evaluation
    /// as opposed to escalating past it.
    pub fn is_restart_eligible(&self) -> bool {
        !matches!(self, PluginError::Config(_))
    }
}
