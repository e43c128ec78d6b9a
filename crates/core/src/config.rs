//! Orchestrator configuration (`modforge.json`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModforgeError, Result};
use crate::manifest::DEFAULT_MANIFEST_FILE;
use crate::settings::LogLevel;

/// Configuration file name looked up in the mods directory.
pub const CONFIG_FILE: &str = "modforge.json";

/// Identity plugins must list in `dependsOn` to be built.
pub const DEFAULT_IDENTITY: &str = "ModForge";

/// Crate names rustc links implicitly; passing them again as `--extern`
/// produces duplicate-crate conflicts.
pub const DEFAULT_REFERENCE_EXCLUDES: &[&str] = &[
    "std",
    "core",
    "alloc",
    "compiler_builtins",
    "rustc_std_workspace_*",
    "panic_abort",
    "panic_unwind",
    "unwind",
    "proc_macro",
    "test",
];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModforgeConfig {
    /// Name plugins depend on to opt into this orchestrator.
    pub identity: String,

    /// Marker/manifest file name inside each plugin directory.
    pub manifest: String,

    /// Orchestrator log file, relative to the mods directory.
    pub log_file: PathBuf,

    /// Orchestrator log verbosity.
    pub log_level: LogLevel,

    pub compiler: CompilerConfig,

    pub references: ReferenceConfig,

    pub cache: CacheConfig,
}

/// External compiler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Compiler program, looked up on `PATH` when not absolute.
    pub program: PathBuf,

    /// Language edition plugins are compiled with.
    pub edition: String,

    /// Extra arguments appended after the fixed template.
    pub extra_args: Vec<String>,
}

/// Reference set settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceConfig {
    /// Directory of runtime libraries. Resolved through the compiler when absent.
    pub runtime_dir: Option<PathBuf>,

    /// Interface library plugins link against. Searched next to the
    /// executable when absent.
    pub interface_library: Option<PathBuf>,

    /// Crate names left out of the reference set. A trailing `*` matches a prefix.
    pub exclude: Vec<String>,
}

/// Artifact cache strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheStrategy {
    /// Artifact must be at least as new as every source and reference.
    #[default]
    Timestamp,

    /// Timestamp rules plus a recorded blake3 hash per source file.
    ContentHash,
}

/// Artifact cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub strategy: CacheStrategy,
}

impl Default for ModforgeConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            manifest: DEFAULT_MANIFEST_FILE.to_string(),
            log_file: PathBuf::from(format!("{}.log", DEFAULT_IDENTITY)),
            log_level: LogLevel::Info,
            compiler: CompilerConfig::default(),
            references: ReferenceConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("rustc"),
            edition: "2021".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            interface_library: None,
            exclude: DEFAULT_REFERENCE_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: CacheStrategy::Timestamp,
        }
    }
}

impl ModforgeConfig {
    /// Loads `modforge.json` from `mods_root`, falling back to defaults when absent.
    pub fn load(mods_root: &Path) -> Result<Self> {
        let path = mods_root.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ModforgeError::FileRead {
            path: path.clone(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| ModforgeError::Config {
            path,
            message: e.to_string(),
        })
    }

    /// Resolves the orchestrator log file against `mods_root`.
    pub fn log_path(&self, mods_root: &Path) -> PathBuf {
        mods_root.join(&self.log_file)
    }
}
