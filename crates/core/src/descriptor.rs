//! Per-plugin metadata assembled from a plugin directory.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use walkdir::WalkDir;

use crate::error::{ModforgeError, Result};
use crate::manifest::PluginManifest;
use crate::settings::{PluginSettings, SETTINGS_FILE};

/// File name of the per-plugin log written during each run.
pub const PLUGIN_LOG_FILE: &str = "log.txt";

/// Extension of the source files handed to the compiler.
pub const SOURCE_EXTENSION: &str = "rs";

/// Crate root looked up inside the source directory.
pub const CRATE_ROOT: &str = "lib.rs";

/// A discovered plugin.
///
/// Built fresh on every discovery pass and never persisted. The settings
/// document is loaded lazily on first access and memoized.
#[derive(Debug)]
pub struct PluginDescriptor {
    /// Plugin name, taken from the directory leaf name.
    pub name: String,

    /// Absolute plugin directory.
    pub root_dir: PathBuf,

    /// Directory holding the plugin sources.
    pub source_dir: PathBuf,

    /// Names this plugin requires to be present.
    pub depends_on: BTreeSet<String>,

    /// Declared artifact path, relative to `root_dir`.
    pub output_file: Option<PathBuf>,

    settings: OnceLock<Option<PluginSettings>>,
}

impl PluginDescriptor {
    /// Builds a descriptor for `root_dir` from its parsed manifest.
    pub fn new(root_dir: impl Into<PathBuf>, manifest: PluginManifest) -> Self {
        let root_dir = root_dir.into();
        let name = root_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_dir = root_dir.join(&manifest.source);

        Self {
            name,
            root_dir,
            source_dir,
            depends_on: manifest.depends_on,
            output_file: manifest.output,
            settings: OnceLock::new(),
        }
    }

    /// Reads `manifest_file` inside `root_dir` and builds a descriptor.
    pub fn load(root_dir: &Path, manifest_file: &str) -> Result<Self> {
        let root_dir = std::path::absolute(root_dir)?;
        let manifest = PluginManifest::from_file(&root_dir.join(manifest_file))?;
        Ok(Self::new(root_dir, manifest))
    }

    /// Returns true if the plugin declares a dependency on `name`.
    pub fn depends_on(&self, name: &str) -> bool {
        self.depends_on.contains(name)
    }

    /// Absolute path of the build artifact, if the plugin declares one.
    pub fn artifact_path(&self) -> Option<PathBuf> {
        self.output_file.as_ref().map(|o| self.root_dir.join(o))
    }

    /// Path of the per-plugin log file.
    pub fn log_path(&self) -> PathBuf {
        self.root_dir.join(PLUGIN_LOG_FILE)
    }

    /// Path of the optional settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.root_dir.join(SETTINGS_FILE)
    }

    /// Enumerates every source file below the source directory, recursively.
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.source_dir).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.source_dir).to_path_buf();
                match e.into_io_error() {
                    Some(source) => ModforgeError::FileRead { path, source },
                    None => ModforgeError::FileRead {
                        path,
                        source: std::io::Error::other("filesystem loop detected"),
                    },
                }
            })?;

            let is_source = entry.file_type().is_file()
                && entry.path().extension().is_some_and(|e| e == SOURCE_EXTENSION);

            if is_source {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Picks the file the compiler is pointed at: `lib.rs` at the top of the
    /// source directory, else the first enumerated source file.
    pub fn crate_root<'a>(&self, sources: &'a [PathBuf]) -> Option<&'a Path> {
        let preferred = self.source_dir.join(CRATE_ROOT);
        sources
            .iter()
            .find(|s| **s == preferred)
            .or_else(|| sources.first())
            .map(PathBuf::as_path)
    }

    /// Crate name handed to the compiler, derived from the plugin name.
    pub fn crate_name(&self) -> String {
        let mut name: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();

        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert(0, '_');
        }

        name
    }

    /// Returns the memoized settings, loading them on first use.
    ///
    /// Load errors are not memoized.
    pub fn settings(&self) -> Result<Option<&PluginSettings>> {
        if let Some(settings) = self.settings.get() {
            return Ok(settings.as_ref());
        }

        let loaded = PluginSettings::load(&self.settings_path())?;
        Ok(self.settings.get_or_init(|| loaded).as_ref())
    }
}

impl fmt::Display for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.root_dir.display())
    }
}
