//! Build-and-load orchestrator.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use modforge_core::{
    BuildOutcome, LogLevel, ModforgeConfig, PluginDescriptor, PluginReport, Result, RunReport,
    SkipReason,
};
use modforge_plugin::PluginContext;
use tracing::instrument::WithSubscriber;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::cache::ArtifactCache;
use crate::compiler::{CompileRequest, Compiler, RustcCompiler};
use crate::discovery::discover;
use crate::loader::{DylibLoader, ModuleLoader, PluginModule};
use crate::logging::{HostLog, PluginLog};
use crate::references::{ReferenceSet, ReferenceSetBuilder};

/// Discovers, builds, loads and initializes every plugin under a mods directory.
///
/// Plugins are processed one at a time in discovery order. A failure in one
/// plugin's pipeline is logged and recorded in its report; it never stops
/// the run.
pub struct Orchestrator<C = RustcCompiler, L = DylibLoader>
where
    L: ModuleLoader,
{
    /// Directory holding one subdirectory per plugin.
    mods_root: PathBuf,

    config: ModforgeConfig,

    /// Libraries every plugin is compiled against.
    references: ReferenceSet,

    /// Artifacts older than this were built against older references.
    min_build_time: Option<SystemTime>,

    compiler: C,

    loader: L,

    cache: ArtifactCache,

    /// Whether valid artifacts are reused.
    use_cache: bool,

    host_log: HostLog,

    /// Libraries stay loaded while their code may still run.
    modules: Vec<L::Module>,
}

impl Orchestrator<RustcCompiler, DylibLoader> {
    /// Creates an orchestrator backed by `rustc` and shared libraries.
    ///
    /// Fails if the compiler, the runtime libraries or the interface library
    /// cannot be resolved.
    pub async fn from_config(mods_root: impl Into<PathBuf>, config: ModforgeConfig) -> Result<Self> {
        let compiler = RustcCompiler::from_config(&config.compiler)?;
        let references = ReferenceSetBuilder::from_config(&config.references, compiler.program())
            .build()
            .await?;

        Ok(Self::new(mods_root, config, references, compiler, DylibLoader))
    }
}

impl<C, L> Orchestrator<C, L>
where
    C: Compiler,
    L: ModuleLoader,
{
    /// Creates an orchestrator from its parts.
    pub fn new(
        mods_root: impl Into<PathBuf>,
        config: ModforgeConfig,
        references: ReferenceSet,
        compiler: C,
        loader: L,
    ) -> Self {
        let min_build_time = references.min_build_time();
        let cache = ArtifactCache::new(config.cache.strategy);
        let use_cache = config.cache.enabled;

        Self {
            mods_root: mods_root.into(),
            config,
            references,
            min_build_time,
            compiler,
            loader,
            cache,
            use_cache,
            host_log: HostLog::disabled(),
            modules: Vec::new(),
        }
    }

    /// Enables or disables artifact reuse.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Sets the sinks mirrored into every plugin's scoped logger.
    pub fn with_host_log(mut self, host_log: HostLog) -> Self {
        self.host_log = host_log;
        self
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn config(&self) -> &ModforgeConfig {
        &self.config
    }

    /// Number of libraries kept loaded.
    pub fn loaded_count(&self) -> usize {
        self.modules.len()
    }

    /// Runs every eligible plugin through build, load and initialization.
    ///
    /// Only discovery of the mods directory itself can fail the run.
    pub async fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        let descriptors = discover(&self.mods_root, &self.config.manifest)?;
        info!(
            mods = %self.mods_root.display(),
            count = descriptors.len(),
            "discovered plugin directories"
        );

        let mut report = RunReport::default();

        for descriptor in &descriptors {
            if !descriptor.depends_on(&self.config.identity) {
                report
                    .skipped
                    .push((descriptor.name.clone(), SkipReason::NotDependent));
                continue;
            }

            if !descriptor.source_dir.is_dir() {
                report
                    .skipped
                    .push((descriptor.name.clone(), SkipReason::NoSourceDir));
                continue;
            }

            let plugin_report = self.process(descriptor).await;
            report.plugins.push(plugin_report);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            processed = report.plugins.len(),
            compiled = report.compile_count(),
            initialized = report.initialized_count(),
            failed = report.failures().count(),
            "run complete"
        );
        self.host_log.flush();

        Ok(report)
    }

    /// Runs one plugin's pipeline with its log file attached.
    async fn process(&mut self, descriptor: &PluginDescriptor) -> PluginReport {
        let (level, settings_error) = match descriptor.settings() {
            Ok(settings) => (settings.map(|s| s.log_level).unwrap_or_default(), None),
            Err(e) => (LogLevel::default(), Some(e.to_string())),
        };

        let plugin_log = PluginLog::open(&descriptor.log_path(), level);
        let dispatch = plugin_log.dispatch(&self.host_log);

        let report = async {
            let span = info_span!("plugin", name = %descriptor.name);
            async {
                if let Some(e) = &settings_error {
                    warn!("ignoring settings: {}", e);
                }
                self.pipeline(descriptor).await
            }
            .instrument(span)
            .await
        }
        .with_subscriber(dispatch)
        .await;

        drop(plugin_log);
        report
    }

    async fn pipeline(&mut self, descriptor: &PluginDescriptor) -> PluginReport {
        info!("detected {}", descriptor.root_dir.display());

        let Some(artifact) = descriptor.artifact_path() else {
            info!("no output declared, nothing to build");
            return PluginReport::new(&descriptor.name, BuildOutcome::NothingToBuild);
        };

        let (build, compiler_invoked) = match descriptor.source_files() {
            Ok(sources) => self.build(descriptor, &artifact, &sources).await,
            Err(e) => {
                error!("could not enumerate sources: {}", e);
                let diagnostics = e.to_string();
                (BuildOutcome::CompileFailed { diagnostics }, false)
            }
        };

        let mut report = PluginReport::new(&descriptor.name, build);
        report.compiler_invoked = compiler_invoked;

        if report.build.has_artifact() {
            report.failure = self.load_and_initialize(descriptor, &artifact).err();
        }

        if report.initialized() {
            info!("initialized plugin {}", descriptor.name);
        }

        report
    }

    /// Reuses a valid artifact or compiles a new one.
    ///
    /// The flag is true if the compiler actually ran.
    async fn build(
        &self,
        descriptor: &PluginDescriptor,
        artifact: &Path,
        sources: &[PathBuf],
    ) -> (BuildOutcome, bool) {
        if self.use_cache && self.cache.is_valid(artifact, sources, self.min_build_time) {
            info!("found up-to-date artifact {}", artifact.display());
            return (BuildOutcome::CachedHit, false);
        }

        let Some(crate_root) = descriptor.crate_root(sources) else {
            let diagnostics = format!(
                "no .{} source files in {}",
                modforge_core::SOURCE_EXTENSION,
                descriptor.source_dir.display()
            );
            error!("could not compile artifact {}: {}", artifact.display(), diagnostics);
            return (BuildOutcome::CompileFailed { diagnostics }, false);
        };

        if let Some(parent) = artifact.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("could not create {}: {}", parent.display(), e);
                let diagnostics = e.to_string();
                return (BuildOutcome::CompileFailed { diagnostics }, false);
            }
        }

        let staging = staging_path(artifact);
        let crate_name = descriptor.crate_name();
        let request = CompileRequest {
            crate_name: &crate_name,
            output: &staging,
            references: &self.references,
            sources,
            crate_root,
        };

        let (outcome, invoked) = match self.compiler.compile(&request).await {
            Ok(output) if output.success => match fs::rename(&staging, artifact) {
                Ok(()) => {
                    if !output.diagnostics.trim().is_empty() {
                        debug!("compiler output:\n{}", output.diagnostics.trim_end());
                    }
                    if let Err(e) = self.cache.record(artifact, sources) {
                        warn!("could not record fingerprint: {}", e);
                    }
                    info!("compiled artifact {}", artifact.display());
                    (BuildOutcome::CompiledOk, true)
                }
                Err(e) => {
                    let diagnostics = format!(
                        "compiler succeeded but {} could not be moved into place: {}",
                        staging.display(),
                        e
                    );
                    (BuildOutcome::CompileFailed { diagnostics }, true)
                }
            },
            Ok(output) => {
                let diagnostics = if output.diagnostics.trim().is_empty() {
                    "compiler reported failure without diagnostics".to_string()
                } else {
                    output.diagnostics
                };
                (BuildOutcome::CompileFailed { diagnostics }, true)
            }
            Err(e) => {
                let diagnostics = e.to_string();
                (BuildOutcome::CompileFailed { diagnostics }, false)
            }
        };

        if let BuildOutcome::CompileFailed { diagnostics } = &outcome {
            let _ = fs::remove_file(&staging);
            error!(
                "could not compile artifact {}:\n{}",
                artifact.display(),
                diagnostics.trim_end()
            );
        }

        (outcome, invoked)
    }

    /// Loads the artifact and calls the plugin's entry point.
    fn load_and_initialize(
        &mut self,
        descriptor: &PluginDescriptor,
        artifact: &Path,
    ) -> std::result::Result<(), BuildOutcome> {
        let module = self.loader.load(artifact).map_err(|e| {
            error!("error loading artifact: {}", e);
            BuildOutcome::LoadFailed {
                reason: e.to_string(),
            }
        })?;

        let declaration = module.declaration().map_err(|e| {
            error!("{}", e);
            BuildOutcome::EntryPointMissing {
                expected: e.expected(),
            }
        })?;

        // The declaration points into the library; keep it mapped.
        self.modules.push(module);

        let config = plugin_config(descriptor);
        let context = PluginContext::new(&descriptor.name, &descriptor.root_dir, &config);

        // Safety: the library backing `declaration` is held in `self.modules`.
        match unsafe { declaration.call(&context) } {
            Ok(()) => Ok(()),
            Err(failure) => {
                error!(
                    causes = ?failure.causes,
                    "error initializing plugin {}: {}",
                    descriptor.name,
                    failure.innermost()
                );
                Err(BuildOutcome::InvocationThrew {
                    error: failure.innermost().to_string(),
                })
            }
        }
    }
}

/// Configuration JSON handed to a plugin: its settings document, or `{}`.
fn plugin_config(descriptor: &PluginDescriptor) -> String {
    match descriptor.settings() {
        Ok(Some(settings)) => settings.to_json(),
        _ => "{}".to_string(),
    }
}

/// Path the compiler writes to before the artifact is replaced.
fn staging_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    artifact.with_file_name(name)
}
