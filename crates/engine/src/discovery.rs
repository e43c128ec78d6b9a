//! Plugin directory discovery.

use std::path::Path;

use modforge_core::{ModforgeError, PluginDescriptor, Result};
use tracing::warn;

/// Enumerates the plugin directories under `mods_root`.
///
/// Only subdirectories containing `manifest_file` are returned, in directory
/// enumeration order. Directories without it are ignored silently; a
/// manifest that fails to parse is logged and skipped.
pub fn discover(mods_root: &Path, manifest_file: &str) -> Result<Vec<PluginDescriptor>> {
    if !mods_root.is_dir() {
        return Err(ModforgeError::ModsRootNotFound(mods_root.to_path_buf()));
    }

    let entries = std::fs::read_dir(mods_root).map_err(|e| ModforgeError::FileRead {
        path: mods_root.to_path_buf(),
        source: e,
    })?;

    let mut descriptors = Vec::new();

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let dir = entry.path();

        if !dir.is_dir() || !dir.join(manifest_file).is_file() {
            continue;
        }

        match PluginDescriptor::load(&dir, manifest_file) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => warn!(dir = %dir.display(), "skipping plugin: {}", e),
        }
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_only_directories_with_manifest() {
        let dir = tempdir().unwrap();
        let mods = dir.path();

        fs::create_dir(mods.join("Foo")).unwrap();
        fs::write(mods.join("Foo/mod.json"), r#"{"dependsOn": ["ModForge"]}"#).unwrap();
        fs::create_dir(mods.join("NoManifest")).unwrap();
        fs::write(mods.join("stray.json"), "{}").unwrap();

        let found = discover(mods, "mod.json").unwrap();
        let names: Vec<_> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Foo"]);
    }

    #[test]
    fn test_invalid_manifest_is_skipped() {
        let dir = tempdir().unwrap();
        let mods = dir.path();

        fs::create_dir(mods.join("Broken")).unwrap();
        fs::write(mods.join("Broken/mod.json"), "{ nope").unwrap();
        fs::create_dir(mods.join("Good")).unwrap();
        fs::write(mods.join("Good/mod.json"), "{}").unwrap();

        let found = discover(mods, "mod.json").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Good");
    }

    #[test]
    fn test_custom_manifest_name() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Foo")).unwrap();
        fs::write(dir.path().join("Foo/plugin.json"), "{}").unwrap();

        assert!(discover(dir.path(), "mod.json").unwrap().is_empty());
        assert_eq!(discover(dir.path(), "plugin.json").unwrap().len(), 1);
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            discover(&dir.path().join("missing"), "mod.json"),
            Err(ModforgeError::ModsRootNotFound(_))
        ));
    }
}
