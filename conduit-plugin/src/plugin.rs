use async_trait::async_trait;
use conduit_message::Message;

use crate::config::PluginConfig;
use crate::error::PluginError;
use crate::runner::RunnerContext;

/// The contract every Input, Decoder, Filter and Output implements.
///
/// Every method has a default no-op implementation except [`Plugin::run`] —
/// a plugin only overrides what it actually needs, matching the source
/// contract's "anything not implemented is treated as a no-op with
/// defaults."
#[async_trait]
pub trait Plugin: Send {
    /// Validates and applies `config`. A rejected config is a `Config`
    /// error: not retried, escalated to the coordinator.
    fn init(&mut self, _config: &PluginConfig) -> Result<(), PluginError> {
        Ok(())
    }

    /// The plugin's main loop. Returning `Ok(())` or `Err` both end this
    /// run and move the owning supervisor to `Stopping`; a non-`Config`
    /// error triggers restart evaluation.
    async fn run(&mut self, ctx: &mut RunnerContext<'_>) -> Result<(), PluginError>;

    /// Best-effort request to unblock any in-progress external I/O within
    /// a bounded grace period. Called by the supervisor before it declares
    /// a long-blocked plugin unresponsive and force-terminates its task.
    fn stop(&mut self) {}

    /// Resets any soft, in-memory state before a restart's fresh `init`.
    /// Note the supervisor constructs a *new* plugin instance per restart
    /// (via the descriptor's constructor) rather than reusing `self` — this
    /// hook exists for plugins that stash handles the constructor can't see,
    /// e.g. to release them explicitly before the instance is dropped.
    fn cleanup_for_restart(&mut self) {}

    /// Lets the plugin observe every message that reaches it, independent
    /// of its own matching — used for self-reporting counters.
    fn report_msg(&mut self, _msg: &Message) {}

    /// Returns this plugin kind's default configuration, used when no
    /// config entry overrides it.
    fn config_struct(&self) -> PluginConfig {
        PluginConfig::default()
    }
}
