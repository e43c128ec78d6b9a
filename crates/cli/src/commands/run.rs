//! Run command implementation.

use std::path::Path;

use miette::{Result, miette};
use modforge_core::ModforgeConfig;
use modforge_engine::{HostLog, Orchestrator};
use tracing_subscriber::filter::LevelFilter;

use crate::output;

/// Builds, loads and initializes every plugin under `mods_root`.
pub async fn execute(mods_root: &Path, force: bool, strict: bool, verbose: bool) -> Result<()> {
    let config = ModforgeConfig::load(mods_root).map_err(|e| miette!("{}", e))?;

    let stderr_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let log_path = config.log_path(mods_root);
    let host_log = match HostLog::open(&log_path, config.log_level) {
        Ok(log) => log,
        Err(e) => {
            output::warning(&format!("Cannot create {}: {}", log_path.display(), e));
            HostLog::disabled()
        }
    }
    .with_stderr(stderr_level);

    // Another subscriber may already be installed when embedded.
    let _ = host_log.install();

    let use_cache = config.cache.enabled && !force;

    let mut orchestrator = Orchestrator::from_config(mods_root, config)
        .await
        .map_err(|e| miette!("Failed to prepare orchestrator: {}", e))?
        .with_cache(use_cache)
        .with_host_log(host_log.clone());

    if force {
        output::info("Cache disabled - every plugin will be recompiled");
    }

    output::info(&format!("Loading plugins from {}", mods_root.display()));

    let report = orchestrator
        .run()
        .await
        .map_err(|e| miette!("Run failed: {}", e))?;

    host_log.flush();

    for plugin in &report.plugins {
        output::plugin_report(plugin);
    }

    if verbose {
        for (name, reason) in &report.skipped {
            output::plugin_skipped(name, *reason);
        }
    }

    let failed = report.failures().count();

    output::summary(
        report.initialized_count(),
        report.compile_count(),
        report.skipped.len(),
        failed,
        report.duration_ms,
    );

    if strict && failed > 0 {
        return Err(miette!("{} plugin(s) failed", failed));
    }

    Ok(())
}
