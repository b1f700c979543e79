use conduit_match::SyntaxError;
use conduit_plugin::PluginError;
use conduit_supervisor::SupervisorError;

/// The coordinator's top-level error, wrapping every crate boundary's own
/// error type behind a single small per-crate error enum, the way each
/// sub-crate surfaces its own errors through a coordinator-level error.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("pipeline config: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin '{name}' has no registered constructor")]
    MissingConstructor { name: String },

    #[error(transparent)]
    Match(#[from] SyntaxError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Errors validating the on-disk pipeline configuration map into a
/// [`crate::config::Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse pipeline config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("pool.capacity must be greater than zero")]
    ZeroPoolCapacity,

    #[error("router.hop_limit must be greater than zero")]
    ZeroHopLimit,

    #[error("plugin '{name}': channel_capacity must be greater than zero")]
    ZeroChannelCapacity { name: String },

    #[error("plugin '{name}': unknown kind '{kind}' (expected input, decoder, filter, or output)")]
    UnknownKind { name: String, kind: String },

    #[error("plugin '{name}': invalid match expression: {source}")]
    InvalidMatch { name: String, source: SyntaxError },
}
