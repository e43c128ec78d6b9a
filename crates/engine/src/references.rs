//! Reference set: the libraries every plugin is compiled against.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use modforge_core::{ModforgeError, ReferenceConfig, Result};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

use crate::cache::newest_modification;

/// Crate name of the interface library plugins link against.
pub const INTERFACE_CRATE: &str = "modforge_plugin";

const LIBRARY_EXTENSION: &str = "rlib";

/// One library in the reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Crate name the library is exposed under.
    pub crate_name: String,

    /// Absolute path of the library file.
    pub path: PathBuf,
}

impl Reference {
    /// Builds a reference from a library path, deriving the crate name from
    /// its file name (`libfoo_bar-1a2b3c.rlib` → `foo_bar`).
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let crate_name = crate_name_of(&path)?;
        Some(Self { crate_name, path })
    }
}

/// Ordered list of libraries shared read-only by every compilation in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    entries: Vec<Reference>,
}

impl ReferenceSet {
    pub fn new(entries: Vec<Reference>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a library with `crate_name` is part of the set.
    pub fn contains_crate(&self, crate_name: &str) -> bool {
        self.entries.iter().any(|r| r.crate_name == crate_name)
    }

    /// Distinct directories holding the references, in first-seen order.
    pub fn search_dirs(&self) -> Vec<&Path> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter_map(|r| r.path.parent())
            .filter(|dir| seen.insert(*dir))
            .collect()
    }

    /// Lower bound for artifact timestamps: an artifact older than any
    /// reference was built against a previous version of it.
    pub fn min_build_time(&self) -> Option<SystemTime> {
        newest_modification(self.entries.iter().map(|r| r.path.as_path()))
    }
}

/// Where the runtime libraries are found.
#[derive(Debug, Clone)]
pub enum RuntimeSource {
    /// An explicit directory.
    Dir(PathBuf),

    /// The target libdir reported by `<compiler> --print target-libdir`.
    Compiler(PathBuf),
}

/// Assembles the [`ReferenceSet`] once per run.
#[derive(Debug, Clone)]
pub struct ReferenceSetBuilder {
    runtime: RuntimeSource,
    interface_library: Option<PathBuf>,
    exclude: Vec<String>,
}

impl ReferenceSetBuilder {
    pub fn new(runtime: RuntimeSource) -> Self {
        Self {
            runtime,
            interface_library: None,
            exclude: Vec::new(),
        }
    }

    /// Creates a builder from configuration; `compiler` is used as the
    /// anchor when no runtime directory is configured.
    pub fn from_config(config: &ReferenceConfig, compiler: &Path) -> Self {
        let runtime = match &config.runtime_dir {
            Some(dir) => RuntimeSource::Dir(dir.clone()),
            None => RuntimeSource::Compiler(compiler.to_path_buf()),
        };

        Self {
            runtime,
            interface_library: config.interface_library.clone(),
            exclude: config.exclude.clone(),
        }
    }

    /// Sets the interface library explicitly.
    pub fn with_interface_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.interface_library = Some(path.into());
        self
    }

    /// Sets the crate-name exclusion patterns.
    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Builds the reference set.
    ///
    /// Fails if the runtime directory or the interface library cannot be
    /// found; no plugin can be compiled without them.
    pub async fn build(&self) -> Result<ReferenceSet> {
        let runtime_dir = self.runtime_dir().await?;
        debug!(dir = %runtime_dir.display(), "resolved runtime library directory");

        let mut entries = list_libraries(&runtime_dir)?;
        entries.push(self.interface_reference()?);
        entries.retain(|r| !self.is_excluded(&r.crate_name));

        // Later entries win, so the interface library overrides stale copies.
        let mut seen = HashSet::new();
        let mut deduped: Vec<Reference> = entries
            .into_iter()
            .rev()
            .filter(|r| seen.insert(r.crate_name.clone()))
            .collect();
        deduped.reverse();

        info!(count = deduped.len(), "collected references");
        Ok(ReferenceSet::new(deduped))
    }

    /// Returns true if `crate_name` matches an exclusion pattern.
    pub fn is_excluded(&self, crate_name: &str) -> bool {
        self.exclude.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => crate_name.starts_with(prefix),
            None => crate_name == pattern,
        })
    }

    async fn runtime_dir(&self) -> Result<PathBuf> {
        let dir = match &self.runtime {
            RuntimeSource::Dir(dir) => dir.clone(),
            RuntimeSource::Compiler(program) => {
                let output = TokioCommand::new(program)
                    .args(["--print", "target-libdir"])
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| {
                        ModforgeError::RuntimeAnchor(format!("{}: {}", program.display(), e))
                    })?;

                if !output.status.success() {
                    return Err(ModforgeError::RuntimeAnchor(format!(
                        "{} --print target-libdir failed: {}",
                        program.display(),
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }

                PathBuf::from(String::from_utf8_lossy(&output.stdout).trim())
            }
        };

        if !dir.is_dir() {
            return Err(ModforgeError::RuntimeAnchor(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        Ok(dir)
    }

    fn interface_reference(&self) -> Result<Reference> {
        let path = match &self.interface_library {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(ModforgeError::InterfaceLibraryNotFound(
                    path.display().to_string(),
                ));
            }
            None => locate_interface_library()?,
        };

        Ok(Reference {
            crate_name: INTERFACE_CRATE.to_string(),
            path: std::path::absolute(path)?,
        })
    }
}

/// Lists the libraries in `dir`, sorted by file name.
fn list_libraries(dir: &Path) -> Result<Vec<Reference>> {
    let read = std::fs::read_dir(dir).map_err(|e| ModforgeError::FileRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == LIBRARY_EXTENSION))
        .collect();
    paths.sort();

    Ok(paths.into_iter().filter_map(Reference::from_path).collect())
}

/// Searches next to the running executable (and its `deps/`) for the newest
/// interface library.
fn locate_interface_library() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let exe_dir = exe.parent().unwrap_or(Path::new("."));

    let newest = [exe_dir.to_path_buf(), exe_dir.join("deps")]
        .iter()
        .filter_map(|dir| list_libraries(dir).ok())
        .flatten()
        .filter(|r| r.crate_name == INTERFACE_CRATE)
        .max_by_key(|r| {
            std::fs::metadata(&r.path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        });

    newest.map(|r| r.path).ok_or_else(|| {
        ModforgeError::InterfaceLibraryNotFound(format!(
            "no lib{}*.{} next to {}",
            INTERFACE_CRATE,
            LIBRARY_EXTENSION,
            exe.display()
        ))
    })
}

/// Derives a crate name from a library file name.
fn crate_name_of(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stem = stem.strip_prefix("lib").unwrap_or(stem);
    let name = match stem.rsplit_once('-') {
        Some((name, _hash)) => name,
        None => stem,
    };

    (!name.is_empty()).then(|| name.replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"rlib").unwrap();
    }

    #[test]
    fn test_crate_name_of() {
        assert_eq!(
            crate_name_of(Path::new("/x/libserde_json-1a2b3c.rlib")),
            Some("serde_json".to_string())
        );
        assert_eq!(
            crate_name_of(Path::new("libmodforge_plugin.rlib")),
            Some("modforge_plugin".to_string())
        );
        assert_eq!(crate_name_of(Path::new("lib.rlib")), None);
    }

    #[test]
    fn test_exclusion_patterns() {
        let builder = ReferenceSetBuilder::new(RuntimeSource::Dir(PathBuf::from(".")))
            .with_exclude(vec!["std".to_string(), "rustc_std_workspace_*".to_string()]);

        assert!(builder.is_excluded("std"));
        assert!(builder.is_excluded("rustc_std_workspace_core"));
        assert!(!builder.is_excluded("std_detect"));
        assert!(!builder.is_excluded("hashbrown"));
    }

    #[tokio::test]
    async fn test_build_from_runtime_dir() {
        let dir = tempdir().unwrap();
        let runtime = dir.path().join("runtime");
        fs::create_dir(&runtime).unwrap();
        touch(&runtime.join("libstd-aaaa.rlib"));
        touch(&runtime.join("libcore-bbbb.rlib"));
        touch(&runtime.join("libhashbrown-cccc.rlib"));
        touch(&runtime.join("libstd-aaaa.so"));
        fs::write(runtime.join("README"), "").unwrap();

        let interface = dir.path().join("libmodforge_plugin-dddd.rlib");
        touch(&interface);

        let set = ReferenceSetBuilder::new(RuntimeSource::Dir(runtime.clone()))
            .with_interface_library(&interface)
            .with_exclude(vec!["std".to_string(), "core".to_string()])
            .build()
            .await
            .unwrap();

        let names: Vec<_> = set.iter().map(|r| r.crate_name.as_str()).collect();
        assert_eq!(names, vec!["hashbrown", INTERFACE_CRATE]);
        assert!(set.contains_crate(INTERFACE_CRATE));
        assert_eq!(set.search_dirs(), vec![runtime.as_path(), dir.path()]);
        assert!(set.min_build_time().is_some());
    }

    #[tokio::test]
    async fn test_interface_library_overrides_runtime_copy() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("libmodforge_plugin-old.rlib"));
        let interface = dir.path().join("libmodforge_plugin-new.rlib");
        touch(&interface);

        let set = ReferenceSetBuilder::new(RuntimeSource::Dir(dir.path().to_path_buf()))
            .with_interface_library(&interface)
            .build()
            .await
            .unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().map(|r| r.path.clone()), Some(interface));
    }

    #[tokio::test]
    async fn test_missing_runtime_dir_is_fatal() {
        let dir = tempdir().unwrap();
        let result = ReferenceSetBuilder::new(RuntimeSource::Dir(dir.path().join("missing")))
            .build()
            .await;

        assert!(matches!(result, Err(ModforgeError::RuntimeAnchor(_))));
    }

    #[tokio::test]
    async fn test_missing_interface_library_is_fatal() {
        let dir = tempdir().unwrap();
        let result = ReferenceSetBuilder::new(RuntimeSource::Dir(dir.path().to_path_buf()))
            .with_interface_library(dir.path().join("libmodforge_plugin.rlib"))
            .build()
            .await;

        assert!(matches!(
            result,
            Err(ModforgeError::InterfaceLibraryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_compiler_anchor_is_fatal() {
        let dir = tempdir().unwrap();
        let result = ReferenceSetBuilder::new(RuntimeSource::Compiler(
            dir.path().join("no-such-compiler"),
        ))
        .build()
        .await;

        assert!(matches!(result, Err(ModforgeError::RuntimeAnchor(_))));
    }
}
