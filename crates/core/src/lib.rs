//! ModForge Core - Core types for the ModForge plugin orchestrator.

mod config;
mod descriptor;
mod error;
mod manifest;
mod outcome;
mod settings;

pub use config::{
    CONFIG_FILE, CacheConfig, CacheStrategy, CompilerConfig, DEFAULT_IDENTITY,
    DEFAULT_REFERENCE_EXCLUDES, ModforgeConfig, ReferenceConfig,
};
pub use descriptor::{CRATE_ROOT, PLUGIN_LOG_FILE, PluginDescriptor, SOURCE_EXTENSION};
pub use error::{ModforgeError, Result};
pub use manifest::{DEFAULT_MANIFEST_FILE, PluginManifest};
pub use outcome::{BuildOutcome, PluginReport, RunReport, SkipReason};
pub use settings::{LogLevel, PluginSettings, SETTINGS_FILE};
