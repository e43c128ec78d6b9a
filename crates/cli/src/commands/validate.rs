//! Validate command implementation.

use std::path::Path;

use miette::{Result, miette};
use modforge_core::{ModforgeConfig, PluginDescriptor};
use modforge_engine::{ReferenceSetBuilder, RustcCompiler};

use crate::output;

/// Checks every manifest and settings file, the compiler and the reference set.
pub async fn execute(mods_root: &Path) -> Result<()> {
    output::info(&format!("Validating {}...", mods_root.display()));

    let config = ModforgeConfig::load(mods_root).map_err(|e| {
        output::error(&format!("Config error: {}", e));
        miette!("Validation failed: {}", e)
    })?;

    let entries = std::fs::read_dir(mods_root)
        .map_err(|e| miette!("Cannot read {}: {}", mods_root.display(), e))?;

    let mut errors = 0;
    let mut eligible = 0;

    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() || !dir.join(&config.manifest).is_file() {
            continue;
        }

        let plugin = match PluginDescriptor::load(&dir, &config.manifest) {
            Ok(plugin) => plugin,
            Err(e) => {
                output::error(&format!("{}: {}", dir.display(), e));
                errors += 1;
                continue;
            }
        };

        if let Err(e) = plugin.settings() {
            output::error(&format!("{}: {}", plugin.name, e));
            errors += 1;
        }

        if !plugin.depends_on(&config.identity) {
            continue;
        }
        eligible += 1;

        if plugin.artifact_path().is_some() && plugin.source_dir.is_dir() {
            match plugin.source_files() {
                Ok(sources) if sources.is_empty() => output::warning(&format!(
                    "{}: no source files in {}",
                    plugin.name,
                    plugin.source_dir.display()
                )),
                Ok(_) => {}
                Err(e) => {
                    output::error(&format!("{}: {}", plugin.name, e));
                    errors += 1;
                }
            }
        }
    }

    let compiler = RustcCompiler::from_config(&config.compiler).map_err(|e| {
        output::error(&format!("Compiler error: {}", e));
        miette!("Validation failed: {}", e)
    })?;
    output::key_value("Compiler", &compiler.program().display().to_string());

    let references = ReferenceSetBuilder::from_config(&config.references, compiler.program())
        .build()
        .await
        .map_err(|e| {
            output::error(&format!("Reference error: {}", e));
            miette!("Validation failed: {}", e)
        })?;
    output::key_value("References", &references.len().to_string());

    if errors > 0 {
        return Err(miette!("Validation failed: {} error(s)", errors));
    }

    output::success(&format!(
        "Mods directory is valid ({} eligible plugins)",
        eligible
    ));

    Ok(())
}
