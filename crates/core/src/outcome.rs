//! Per-plugin outcomes and the report of a whole run.

use std::fmt;

/// Result of one stage of a plugin's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The manifest declares no output; load and invoke are skipped.
    NothingToBuild,

    /// The existing artifact was up to date.
    CachedHit,

    /// The compiler produced a fresh artifact.
    CompiledOk,

    /// The compiler rejected the sources.
    CompileFailed { diagnostics: String },

    /// The artifact could not be loaded as a library.
    LoadFailed { reason: String },

    /// The library lacks the expected entry point or declares an incompatible one.
    EntryPointMissing { expected: String },

    /// The entry point reported an error or panicked. `error` is the innermost cause.
    InvocationThrew { error: String },
}

impl BuildOutcome {
    /// Returns true for the outcomes that end the build stage with a usable artifact.
    pub fn has_artifact(&self) -> bool {
        matches!(self, BuildOutcome::CachedHit | BuildOutcome::CompiledOk)
    }

    /// Returns true for failure outcomes.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BuildOutcome::CompileFailed { .. }
                | BuildOutcome::LoadFailed { .. }
                | BuildOutcome::EntryPointMissing { .. }
                | BuildOutcome::InvocationThrew { .. }
        )
    }

    /// Short label for summaries.
    pub fn label(&self) -> &'static str {
        match self {
            BuildOutcome::NothingToBuild => "nothing to build",
            BuildOutcome::CachedHit => "up to date",
            BuildOutcome::CompiledOk => "compiled",
            BuildOutcome::CompileFailed { .. } => "compile failed",
            BuildOutcome::LoadFailed { .. } => "load failed",
            BuildOutcome::EntryPointMissing { .. } => "entry point missing",
            BuildOutcome::InvocationThrew { .. } => "initialization failed",
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::CompileFailed { diagnostics } => {
                write!(f, "{}: {}", self.label(), diagnostics.trim_end())
            }
            BuildOutcome::LoadFailed { reason } => write!(f, "{}: {}", self.label(), reason),
            BuildOutcome::EntryPointMissing { expected } => {
                write!(f, "{}: expected {}", self.label(), expected)
            }
            BuildOutcome::InvocationThrew { error } => write!(f, "{}: {}", self.label(), error),
            _ => f.write_str(self.label()),
        }
    }
}

/// What happened to a single plugin during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginReport {
    /// Plugin name.
    pub name: String,

    /// Build stage result.
    pub build: BuildOutcome,

    /// Failure past the build stage (load, contract, invocation).
    pub failure: Option<BuildOutcome>,

    /// Whether the compiler ran. A `CompileFailed` build may have stopped
    /// before it, e.g. when the source directory holds no source files.
    pub compiler_invoked: bool,
}

impl PluginReport {
    pub fn new(name: impl Into<String>, build: BuildOutcome) -> Self {
        Self {
            name: name.into(),
            compiler_invoked: matches!(build, BuildOutcome::CompiledOk),
            build,
            failure: None,
        }
    }

    /// The outcome the pipeline ended on.
    pub fn outcome(&self) -> &BuildOutcome {
        self.failure.as_ref().unwrap_or(&self.build)
    }

    /// Returns true if the compiler was invoked for this plugin.
    pub fn compiled(&self) -> bool {
        self.compiler_invoked
    }

    /// Returns true if the entry point ran to completion.
    pub fn initialized(&self) -> bool {
        self.build.has_artifact() && self.failure.is_none()
    }

    /// Returns true if the plugin ended on a failure outcome.
    pub fn is_failure(&self) -> bool {
        self.outcome().is_failure()
    }
}

/// Why a discovered plugin was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The manifest does not list the orchestrator's identity.
    NotDependent,

    /// The source directory does not exist.
    NoSourceDir,
}

/// Report of a complete orchestrator run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Processed plugins, in discovery order.
    pub plugins: Vec<PluginReport>,

    /// Plugins left out before any build attempt.
    pub skipped: Vec<(String, SkipReason)>,

    /// Total run time in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Looks up a plugin's report by name.
    pub fn get(&self, name: &str) -> Option<&PluginReport> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Number of compiler invocations during the run.
    pub fn compile_count(&self) -> usize {
        self.plugins.iter().filter(|p| p.compiled()).count()
    }

    /// Number of plugins whose entry point completed.
    pub fn initialized_count(&self) -> usize {
        self.plugins.iter().filter(|p| p.initialized()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PluginReport> {
        self.plugins.iter().filter(|p| p.is_failure())
    }
}
