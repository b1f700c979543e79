use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("plugin configuration rejected during {phase}: {source}")]
    Config {
        phase: &'static str,
        #[source]
        source: conduit_plugin::PluginError,
    },
}
