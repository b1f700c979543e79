/// Which of the four plugin kinds a descriptor describes. The coordinator's
/// startup order depends on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Input,
    Decoder,
    Filter,
    Output,
}

/// The configuration blob handed to [`crate::Plugin::init`].
///
/// Concrete plugins are out of this crate's scope; `conduit` core only
/// needs to carry their configuration opaquely from the TOML pipeline map
/// through to the plugin's own `init`. A plugin that
/// wants a typed view deserializes `raw` itself with `toml::Value::try_into`.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    pub raw: toml::value::Table,
}

impl PluginConfig {
    pub fn new(raw: toml::value::Table) -> Self {
        PluginConfig { raw }
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.raw.get(key)
    }
}
