//! Orchestrator log and per-plugin log files.
//!
//! The host log is installed as the global subscriber. While a plugin's
//! pipeline runs, a scoped dispatcher forwards every event to the host sinks
//! and to the plugin's own `log.txt`.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modforge_core::LogLevel;
use tracing::{Dispatch, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Environment variable overriding the stderr log filter.
pub const LOG_ENV: &str = "MODFORGE_LOG";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Maps a settings level onto a tracing filter.
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

/// Orchestrator-level sinks: an optional log file and optional stderr output.
#[derive(Debug, Clone)]
pub struct HostLog {
    file: Option<Arc<File>>,
    file_level: LevelFilter,
    stderr_level: Option<LevelFilter>,
}

impl HostLog {
    /// No sinks at all.
    pub fn disabled() -> Self {
        Self {
            file: None,
            file_level: LevelFilter::OFF,
            stderr_level: None,
        }
    }

    /// Opens (truncating) the orchestrator log file.
    pub fn open(path: &Path, level: LogLevel) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            file: Some(Arc::new(file)),
            file_level: level_filter(level),
            stderr_level: None,
        })
    }

    /// Also writes to stderr at `level`, unless `MODFORGE_LOG` overrides it.
    pub fn with_stderr(mut self, level: LevelFilter) -> Self {
        self.stderr_level = Some(level);
        self
    }

    /// Installs the host sinks as the global default subscriber.
    pub fn install(&self) -> Result<(), TryInitError> {
        Registry::default().with(self.layers()).try_init()
    }

    /// Flushes the log file.
    pub fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = (&**file).flush();
        }
    }

    fn layers(&self) -> Vec<BoxedLayer> {
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if let Some(level) = self.stderr_level {
            let filter = EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
            layers.push(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .with_filter(filter)
                    .boxed(),
            );
        }

        if let Some(file) = &self.file {
            layers.push(file_layer(file.clone(), self.file_level));
        }

        layers
    }
}

impl Default for HostLog {
    fn default() -> Self {
        Self::disabled()
    }
}

/// A plugin's `log.txt`, open for the duration of its pipeline.
///
/// Dropping it flushes and closes the file.
#[derive(Debug)]
pub struct PluginLog {
    file: Option<Arc<File>>,
    level: LevelFilter,
    path: PathBuf,
}

impl PluginLog {
    /// Opens (truncating) the log file. If it cannot be created the pipeline
    /// continues with host logging only.
    pub fn open(path: &Path, level: LogLevel) -> Self {
        let file = match File::create(path) {
            Ok(file) => Some(Arc::new(file)),
            Err(e) => {
                warn!(path = %path.display(), "can't create log file: {}", e);
                None
            }
        };

        Self {
            file,
            level: level_filter(level),
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the log file was opened.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Dispatcher writing to the host sinks and to this plugin's file.
    pub fn dispatch(&self, host: &HostLog) -> Dispatch {
        let mut layers = host.layers();
        if let Some(file) = &self.file {
            layers.push(file_layer(file.clone(), self.level));
        }
        Dispatch::new(Registry::default().with(layers))
    }
}

impl Drop for PluginLog {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = (&*file).flush();
            let _ = file.sync_data();
        }
    }
}

fn file_layer(file: Arc<File>, level: LevelFilter) -> BoxedLayer {
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(false)
        .with_filter(level)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing::{debug, error, info};

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_filter(LogLevel::Info), LevelFilter::INFO);
        assert_eq!(level_filter(LogLevel::Error), LevelFilter::ERROR);
    }

    #[test]
    fn test_plugin_log_respects_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let log = PluginLog::open(&path, LogLevel::Info);
        assert!(log.is_open());
        let dispatch = log.dispatch(&HostLog::disabled());
        tracing::dispatcher::with_default(&dispatch, || {
            info!("compiled artifact");
            debug!("hidden detail");
        });
        drop(dispatch);
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("compiled artifact"));
        assert!(!content.contains("hidden detail"));
    }

    #[test]
    fn test_plugin_log_truncated_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        drop(PluginLog::open(&path, LogLevel::Info));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_host_file_receives_plugin_events() {
        let dir = tempdir().unwrap();
        let host_path = dir.path().join("ModForge.log");
        let plugin_path = dir.path().join("log.txt");

        let host = HostLog::open(&host_path, LogLevel::Info).unwrap();
        let log = PluginLog::open(&plugin_path, LogLevel::Error);
        tracing::dispatcher::with_default(&log.dispatch(&host), || {
            info!("detected plugin");
            error!("could not compile");
        });
        drop(log);
        host.flush();

        let host_content = std::fs::read_to_string(&host_path).unwrap();
        assert!(host_content.contains("detected plugin"));
        assert!(host_content.contains("could not compile"));

        let plugin_content = std::fs::read_to_string(&plugin_path).unwrap();
        assert!(!plugin_content.contains("detected plugin"));
        assert!(plugin_content.contains("could not compile"));
    }

    #[test]
    fn test_unwritable_log_path_is_tolerated() {
        let dir = tempdir().unwrap();
        let log = PluginLog::open(&dir.path().join("missing/dir/log.txt"), LogLevel::Info);
        assert!(!log.is_open());

        // Still usable as a dispatcher.
        tracing::dispatcher::with_default(&log.dispatch(&HostLog::disabled()), || {
            info!("no file");
        });
    }
}
