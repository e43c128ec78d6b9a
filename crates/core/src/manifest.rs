//! Plugin manifest (`mod.json`) declaring dependencies and build output.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModforgeError, Result};

/// Default manifest file name looked up in every plugin directory.
pub const DEFAULT_MANIFEST_FILE: &str = "mod.json";

/// Plugin manifest containing dependency markers and build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Names this plugin requires to be present.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,

    /// Build artifact path, relative to the plugin directory.
    /// Absent means there is nothing to build.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Source directory, relative to the plugin directory.
    #[serde(default = "default_source_dir")]
    pub source: PathBuf,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("source")
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            depends_on: BTreeSet::new(),
            output: None,
            source: default_source_dir(),
        }
    }
}

impl PluginManifest {
    /// Loads a manifest from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModforgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|message| ModforgeError::Manifest {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses and validates a manifest from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let manifest: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Converts the manifest to a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Creates a manifest depending on `identity` and producing `output`.
    pub fn new(identity: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            depends_on: BTreeSet::from([identity.into()]),
            output: Some(output.into()),
            source: default_source_dir(),
        }
    }

    /// Returns true if the manifest declares a dependency on `name`.
    pub fn depends_on(&self, name: &str) -> bool {
        self.depends_on.contains(name)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(output) = &self.output {
            ensure_contained("output", output)?;
        }
        ensure_contained("source", &self.source)
    }
}

/// Rejects paths that are absolute or climb out of the plugin directory.
fn ensure_contained(field: &str, path: &Path) -> std::result::Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("'{}' must not be empty", field));
    }

    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if escapes {
        return Err(format!(
            "'{}' must be a path inside the plugin directory, got {}",
            field,
            path.display()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"{
            "dependsOn": ["ModForge", "OtherLib"],
            "output": "Foo.so"
        }"#;

        let manifest = PluginManifest::from_json(json).unwrap();
        assert!(manifest.depends_on("ModForge"));
        assert!(manifest.depends_on("OtherLib"));
        assert!(!manifest.depends_on("Missing"));
        assert_eq!(manifest.output, Some(PathBuf::from("Foo.so")));
        assert_eq!(manifest.source, PathBuf::from("source"));
    }

    #[test]
    fn test_missing_output_means_nothing_to_build() {
        let manifest = PluginManifest::from_json(r#"{"dependsOn": ["ModForge"]}"#).unwrap();
        assert!(manifest.output.is_none());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{"name": "Foo", "version": "1.0", "dependsOn": []}"#;
        let manifest = PluginManifest::from_json(json).unwrap();
        assert!(manifest.depends_on.is_empty());
    }

    #[test]
    fn test_rejects_escaping_output() {
        let err = PluginManifest::from_json(r#"{"output": "../Other/Foo.so"}"#).unwrap_err();
        assert!(err.contains("output"));

        assert!(PluginManifest::from_json(r#"{"output": "/tmp/Foo.so"}"#).is_err());
        assert!(PluginManifest::from_json(r#"{"source": ""}"#).is_err());
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.json");
        std::fs::write(&path, "{ not json").unwrap();

        match PluginManifest::from_file(&path) {
            Err(ModforgeError::Manifest { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected manifest error, got {:?}", other),
        }
    }

    #[test]
    fn test_serialize_manifest() {
        let manifest = PluginManifest::new("ModForge", "Foo.so");
        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"dependsOn\""));
        assert!(json.contains("\"output\": \"Foo.so\""));
        assert_eq!(PluginManifest::from_json(&json).unwrap(), manifest);
    }
}
