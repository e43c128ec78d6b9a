//! List command implementation.

use std::path::Path;

use console::style;
use miette::{Result, miette};
use modforge_core::ModforgeConfig;

/// Lists the plugin directories under `mods_root`.
pub fn execute(mods_root: &Path, detailed: bool) -> Result<()> {
    let config = ModforgeConfig::load(mods_root).map_err(|e| miette!("{}", e))?;
    let mut plugins =
        modforge_engine::discover(mods_root, &config.manifest).map_err(|e| miette!("{}", e))?;

    // Discovery order is the load order; listing is sorted for readability.
    plugins.sort_by(|a, b| a.name.cmp(&b.name));

    println!("{}", style("Plugins:").bold());
    println!();

    for plugin in &plugins {
        let eligible = plugin.depends_on(&config.identity);

        print!("  {}", style(&plugin.name).cyan().bold());

        if !eligible {
            print!(" {}", style(format!("(not a {} dependent)", config.identity)).dim());
        } else if !plugin.source_dir.is_dir() {
            print!(" {}", style("(no source directory)").dim());
        }

        match plugin.artifact_path() {
            Some(artifact) if artifact.exists() => print!(" {}", style("[built]").green()),
            Some(_) => print!(" {}", style("[not built]").yellow()),
            None => {}
        }

        println!();

        if detailed {
            println!("    Directory: {}", style(plugin.root_dir.display()).dim());

            if let Some(artifact) = plugin.artifact_path() {
                println!("    Output: {}", style(artifact.display()).dim());
            }

            let deps: Vec<_> = plugin.depends_on.iter().map(String::as_str).collect();
            if !deps.is_empty() {
                println!("    Dependencies: {}", style(deps.join(", ")).dim());
            }

            if let Ok(Some(settings)) = plugin.settings() {
                println!("    Log level: {}", style(settings.log_level).dim());
            }

            println!();
        }
    }

    if plugins.is_empty() {
        println!("  {}", style("(none)").dim());
    }

    Ok(())
}
