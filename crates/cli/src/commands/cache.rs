//! Cache command implementation.

use std::path::Path;

use console::style;
use miette::{Result, miette};
use modforge_core::{ModforgeConfig, PluginDescriptor};
use modforge_engine::{ArtifactCache, ReferenceSetBuilder, RustcCompiler};

use crate::output;

/// Plugins that declare an output and opt into ModForge.
fn buildable(mods_root: &Path, config: &ModforgeConfig) -> Result<Vec<PluginDescriptor>> {
    let plugins =
        modforge_engine::discover(mods_root, &config.manifest).map_err(|e| miette!("{}", e))?;

    Ok(plugins
        .into_iter()
        .filter(|p| p.depends_on(&config.identity) && p.artifact_path().is_some())
        .collect())
}

/// Deletes every artifact and fingerprint.
pub fn clean(mods_root: &Path) -> Result<()> {
    let config = ModforgeConfig::load(mods_root).map_err(|e| miette!("{}", e))?;

    let mut removed = 0;
    for plugin in buildable(mods_root, &config)? {
        let Some(artifact) = plugin.artifact_path() else {
            continue;
        };

        if ArtifactCache::invalidate(&artifact)
            .map_err(|e| miette!("Failed to remove {}: {}", artifact.display(), e))?
        {
            removed += 1;
        }
    }

    if removed > 0 {
        output::success(&format!("Removed {} artifact(s)", removed));
    } else {
        output::info("No artifacts to remove");
    }

    Ok(())
}

/// Shows which artifacts would be reused by the next run.
pub async fn status(mods_root: &Path) -> Result<()> {
    let config = ModforgeConfig::load(mods_root).map_err(|e| miette!("{}", e))?;
    let cache = ArtifactCache::new(config.cache.strategy);

    // Staleness against the references is best effort here.
    let min_build_time = match RustcCompiler::from_config(&config.compiler) {
        Ok(compiler) => {
            match ReferenceSetBuilder::from_config(&config.references, compiler.program())
                .build()
                .await
            {
                Ok(references) => references.min_build_time(),
                Err(e) => {
                    output::warning(&format!("Cannot resolve references: {}", e));
                    None
                }
            }
        }
        Err(e) => {
            output::warning(&format!("{}", e));
            None
        }
    };

    let plugins = buildable(mods_root, &config)?;

    println!("Cache status:");
    output::key_value("Location", &mods_root.display().to_string());
    output::key_value("Strategy", &format!("{:?}", cache.strategy()));
    output::key_value("Artifacts", &plugins.len().to_string());
    println!();

    for plugin in &plugins {
        let Some(artifact) = plugin.artifact_path() else {
            continue;
        };

        let state = if !artifact.exists() {
            style("missing").yellow()
        } else {
            match plugin.source_files() {
                Ok(sources) if cache.is_valid(&artifact, &sources, min_build_time) => {
                    style("up to date").green()
                }
                _ => style("stale").yellow(),
            }
        };

        println!("  {} - {}", plugin.name, state);
    }

    Ok(())
}
