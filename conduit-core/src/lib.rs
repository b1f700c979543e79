//! The pipeline coordinator: builds the plugin graph from a
//! validated config and a caller-supplied constructor registry, drives
//! startup and shutdown in dependency order, and exposes an injection API
//! and periodic reporting snapshot.

mod config;
mod coordinator;
mod descriptor;
mod error;
mod reporting;

pub use config::{Config, PluginSpec, RawPipeline, RawPluginEntry, RawRestartPolicy, Settings};
pub use coordinator::Coordinator;
pub use descriptor::PluginDescriptor;
pub use error::{ConfigError, CoreError};
pub use reporting::{PipelineSnapshot, SupervisorSnapshot};
