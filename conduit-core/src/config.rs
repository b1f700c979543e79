use std::collections::BTreeMap;
use std::time::Duration;

use conduit_match::{compile, Expr};
use conduit_plugin::{PluginConfig, PluginKind};
use conduit_supervisor::RestartPolicy;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_POOL_CAPACITY: usize = 256;
const DEFAULT_HOP_LIMIT: u32 = 8;
const DEFAULT_SLOW_SUPERVISOR_MS: u64 = 250;
const DEFAULT_CHANNEL_CAPACITY: usize = 128;
const DEFAULT_BASE_DELAY_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Environment-derived knobs that sit outside the on-disk pipeline map —
/// the `Settings` half of a `ddtelemetry::config`-style settings/config split.
/// Everything describing the plugin graph itself lives in the TOML-sourced
/// [`Config`] instead.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_filter: String,
    pub shutdown_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_filter: "info".to_string(),
            shutdown_grace: conduit_supervisor::DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl Settings {
    const CONDUIT_LOG: &'static str = "CONDUIT_LOG";
    const CONDUIT_SHUTDOWN_GRACE_MS: &'static str = "CONDUIT_SHUTDOWN_GRACE_MS";

    pub fn from_env() -> Self {
        let default = Self::default();
        Settings {
            log_filter: std::env::var(Self::CONDUIT_LOG)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(default.log_filter),
            shutdown_grace: std::env::var(Self::CONDUIT_SHUTDOWN_GRACE_MS)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.shutdown_grace),
        }
    }
}

/// The on-disk shape of the pipeline configuration map: a name ->
/// descriptor table, plus a handful of pool/router-wide knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipeline {
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    #[serde(default = "default_hop_limit")]
    pub hop_limit: u32,
    #[serde(default = "default_slow_supervisor_ms")]
    pub slow_supervisor_threshold_ms: u64,
    #[serde(default)]
    pub plugins: BTreeMap<String, RawPluginEntry>,
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}
fn default_hop_limit() -> u32 {
    DEFAULT_HOP_LIMIT
}
fn default_slow_supervisor_ms() -> u64 {
    DEFAULT_SLOW_SUPERVISOR_MS
}
fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_restartable() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPluginEntry {
    pub kind: String,
    #[serde(rename = "match", default)]
    pub match_expr: Option<String>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    #[serde(default)]
    pub restart: RawRestartPolicy,
    #[serde(default)]
    pub config: toml::value::Table,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRestartPolicy {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
    #[serde(default = "default_restartable")]
    pub restartable: bool,
}

impl Default for RawRestartPolicy {
    fn default() -> Self {
        RawRestartPolicy {
            max_retries: 0,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: 0,
            restartable: default_restartable(),
        }
    }
}

/// One plugin's validated descriptor fields, merged from its `RawPluginEntry`.
/// The constructor itself isn't here — that's supplied separately by the
/// embedder's registry, since concrete plugin bodies are out of scope here.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub kind: PluginKind,
    /// Compiled matcher; always present for Filter/Output (defaulting to
    /// `TRUE` when the config omits one), always absent for Input/Decoder.
    pub matcher: Option<Expr>,
    pub restart_policy: RestartPolicy,
    pub restartable: bool,
    pub channel_capacity: usize,
    pub tick_interval: Option<Duration>,
    pub config: PluginConfig,
}

/// The validated pipeline configuration — the `Config` half of the split.
/// Built from a [`RawPipeline`] by [`Config::from_raw`], which is the only
/// place pool/hop-limit/matcher-compile errors can surface.
#[derive(Debug, Clone)]
pub struct Config {
    pub pool_capacity: usize,
    pub hop_limit: u32,
    pub slow_supervisor_threshold: Duration,
    pub plugins: BTreeMap<String, PluginSpec>,
}

impl Config {
    pub fn from_toml_str(raw_toml: &str) -> Result<Config, ConfigError> {
        let raw: RawPipeline = toml::from_str(raw_toml)?;
        Config::from_raw(raw)
    }

    pub fn from_raw(raw: RawPipeline) -> Result<Config, ConfigError> {
        if raw.pool_capacity == 0 {
            return Err(ConfigError::ZeroPoolCapacity);
        }
        if raw.hop_limit == 0 {
            return Err(ConfigError::ZeroHopLimit);
        }

        let mut plugins = BTreeMap::new();
        for (name, entry) in raw.plugins {
            if entry.channel_capacity == 0 {
                return Err(ConfigError::ZeroChannelCapacity { name });
            }
            let kind = parse_kind(&name, &entry.kind)?;
            let matcher = compile_matcher(&name, kind, entry.match_expr.as_deref())?;
            let restart_policy = RestartPolicy {
                max_retries: entry.restart.max_retries,
                base_delay: Duration::from_millis(entry.restart.base_delay_ms),
                max_delay: Duration::from_millis(entry.restart.max_delay_ms),
                jitter: Duration::from_millis(entry.restart.jitter_ms),
            };

            plugins.insert(
                name,
                PluginSpec {
                    kind,
                    matcher,
                    restart_policy,
                    restartable: entry.restart.restartable,
                    channel_capacity: entry.channel_capacity,
                    tick_interval: entry.tick_interval_ms.map(Duration::from_millis),
                    config: PluginConfig::new(entry.config),
                },
            );
        }

        Ok(Config {
            pool_capacity: raw.pool_capacity,
            hop_limit: raw.hop_limit,
            slow_supervisor_threshold: Duration::from_millis(raw.slow_supervisor_threshold_ms),
            plugins,
        })
    }
}

fn parse_kind(name: &str, raw: &str) -> Result<PluginKind, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "input" => Ok(PluginKind::Input),
        "decoder" => Ok(PluginKind::Decoder),
        "filter" => Ok(PluginKind::Filter),
        "output" => Ok(PluginKind::Output),
        other => {
            Err(ConfigError::UnknownKind { name: name.to_string(), kind: other.to_string() })
        }
    }
}

/// Filter/Output plugins always get a compiled matcher — `TRUE` (match
/// everything) when the config omits one, since the router's fan-out
/// decision has nowhere else to fall back to. Input/Decoder plugins
/// never match on content, so they get none.
fn compile_matcher(
    name: &str,
    kind: PluginKind,
    src: Option<&str>,
) -> Result<Option<Expr>, ConfigError> {
    match (kind, src) {
        (PluginKind::Filter, Some(src)) | (PluginKind::Output, Some(src)) => compile(src)
            .map(Some)
            .map_err(|source| ConfigError::InvalidMatch { name: name.to_string(), source }),
        (PluginKind::Filter, None) | (PluginKind::Output, None) => {
            Ok(Some(compile("TRUE").expect("the literal TRUE always compiles")))
        }
        (PluginKind::Input, _) | (PluginKind::Decoder, _) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_pipeline() {
        let toml = r#"
            pool_capacity = 64
            hop_limit = 4

            [plugins.stdin]
            kind = "input"

            [plugins.stdout]
            kind = "output"
            match = "Severity >= 3.0"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.pool_capacity, 64);
        assert_eq!(config.hop_limit, 4);
        assert!(config.plugins["stdin"].matcher.is_none());
        assert!(config.plugins["stdout"].matcher.is_some());
    }

    #[test]
    fn filter_without_a_match_expression_defaults_to_true() {
        let toml = r#"
            [plugins.everything]
            kind = "filter"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(config.plugins["everything"].matcher.is_some());
    }

    #[test]
    fn zero_pool_capacity_is_rejected() {
        let toml = "pool_capacity = 0";
        assert!(matches!(Config::from_toml_str(toml), Err(ConfigError::ZeroPoolCapacity)));
    }

    #[test]
    fn unknown_plugin_kind_is_rejected() {
        let toml = r#"
            [plugins.mystery]
            kind = "transformer"
        "#;
        assert!(matches!(Config::from_toml_str(toml), Err(ConfigError::UnknownKind { .. })));
    }

    #[test]
    fn invalid_match_expression_is_rejected() {
        let toml = r#"
            [plugins.broken]
            kind = "filter"
            match = "Severity >>> 3"
        "#;
        assert!(matches!(Config::from_toml_str(toml), Err(ConfigError::InvalidMatch { .. })));
    }
}
