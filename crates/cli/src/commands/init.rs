//! Init command implementation.

use std::fs;
use std::path::Path;

use miette::{Result, miette};
use modforge_core::{ModforgeConfig, PluginManifest};

use crate::output;

const TEMPLATE: &str = r#"use modforge_plugin::{Plugin, PluginContext, PluginResult, declare_plugin};

struct Mod;

impl Plugin for Mod {
    fn initialize(ctx: &PluginContext<'_>) -> PluginResult {
        println!("{} loaded from {}", ctx.name(), ctx.mod_dir().display());
        Ok(())
    }
}

declare_plugin!(Mod);
"#;

/// Scaffolds `<mods_root>/<name>` with a manifest and a minimal plugin.
pub fn execute(mods_root: &Path, name: &str, force: bool) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(miette!("Invalid plugin name '{}'", name));
    }

    let config = ModforgeConfig::load(mods_root).map_err(|e| miette!("{}", e))?;
    let plugin_dir = mods_root.join(name);
    let manifest_path = plugin_dir.join(&config.manifest);

    if manifest_path.exists() && !force {
        return Err(miette!(
            "{} already exists. Use --force to overwrite.",
            manifest_path.display()
        ));
    }

    let output_file = format!("{}{}", name, std::env::consts::DLL_SUFFIX);
    let manifest = PluginManifest::new(&config.identity, output_file);
    let manifest_json = manifest.to_json().map_err(|e| miette!("{}", e))?;

    let source_dir = plugin_dir.join(&manifest.source);
    fs::create_dir_all(&source_dir)
        .map_err(|e| miette!("Failed to create {}: {}", source_dir.display(), e))?;

    fs::write(&manifest_path, manifest_json)
        .map_err(|e| miette!("Failed to write {}: {}", manifest_path.display(), e))?;

    let lib_path = source_dir.join(modforge_core::CRATE_ROOT);
    if !lib_path.exists() || force {
        fs::write(&lib_path, TEMPLATE)
            .map_err(|e| miette!("Failed to write {}: {}", lib_path.display(), e))?;
    }

    output::success(&format!("Created plugin {}", plugin_dir.display()));
    output::info("Run 'modforge run' to build and load it");

    Ok(())
}
