//! Terminal output formatting.

use console::style;
use modforge_core::{BuildOutcome, PluginReport, SkipReason};

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), message);
}

/// Prints one plugin's result.
pub fn plugin_report(report: &PluginReport) {
    match report.outcome() {
        BuildOutcome::NothingToBuild => plugin_dim(&report.name, "(nothing to build)"),
        BuildOutcome::CachedHit => plugin_ok(&report.name, "(cached)"),
        BuildOutcome::CompiledOk => plugin_ok(&report.name, "(compiled)"),
        failure => plugin_failed(&report.name, failure),
    }
}

/// Prints a plugin that was not processed.
pub fn plugin_skipped(name: &str, reason: SkipReason) {
    let reason = match reason {
        SkipReason::NotDependent => "(not a dependent)",
        SkipReason::NoSourceDir => "(no source directory)",
    };
    plugin_dim(name, reason);
}

fn plugin_ok(name: &str, detail: &str) {
    println!("{} {} {}", style("✓").green(), name, style(detail).dim());
}

fn plugin_dim(name: &str, detail: &str) {
    println!(
        "{} {} {}",
        style("○").dim(),
        style(name).dim(),
        style(detail).dim()
    );
}

fn plugin_failed(name: &str, outcome: &BuildOutcome) {
    let message = outcome.to_string();
    let mut lines = message.lines();

    eprintln!(
        "{} {} - {}",
        style("✗").red(),
        style(name).red(),
        lines.next().unwrap_or(outcome.label())
    );

    // Only the first lines of compiler output; the full text is in log.txt.
    for line in lines.take(8) {
        eprintln!("    {}", style(line).dim());
    }
}

/// Prints a summary of the run.
pub fn summary(loaded: usize, compiled: usize, skipped: usize, failed: usize, duration_ms: u64) {
    println!();

    if failed > 0 {
        println!(
            "{}: {} loaded ({} compiled), {} skipped, {} failed in {}ms",
            style("FAILED").red().bold(),
            loaded,
            compiled,
            skipped,
            failed,
            duration_ms
        );
    } else {
        println!(
            "{}: {} loaded ({} compiled), {} skipped in {}ms",
            style("SUCCESS").green().bold(),
            loaded,
            compiled,
            skipped,
            duration_ms
        );
    }
}

/// Prints a key-value pair.
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}
