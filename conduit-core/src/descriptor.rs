use conduit_supervisor::PluginConstructor;

use crate::config::PluginSpec;

/// One plugin's full descriptor: its validated config-derived spec plus the
/// constructor supplied by the embedder's registry. Concrete plugin bodies
/// (and therefore the constructors that build them) are out of this crate's
/// scope, so the registry is handed in by the caller rather than resolved
/// from the TOML config alone.
pub struct PluginDescriptor {
    pub name: String,
    pub spec: PluginSpec,
    pub constructor: PluginConstructor,
}
