//! Artifact cache deciding whether a plugin needs recompiling.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use modforge_core::{CacheStrategy, Result};
use serde::{Deserialize, Serialize};

/// Decides whether a previously built artifact is still valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactCache {
    strategy: CacheStrategy,
}

/// Source hashes recorded next to an artifact by the content-hash strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// blake3 hash of each source file.
    pub sources: BTreeMap<PathBuf, String>,
}

impl ArtifactCache {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Checks whether `artifact` is still valid.
    ///
    /// The artifact must exist, be no older than `min_build_time`, and no
    /// source may be strictly newer than it. Equal timestamps count as valid.
    /// Any filesystem error makes the artifact invalid.
    pub fn is_valid(
        &self,
        artifact: &Path,
        sources: &[PathBuf],
        min_build_time: Option<SystemTime>,
    ) -> bool {
        let Some(artifact_time) = modified(artifact) else {
            return false;
        };

        if min_build_time.is_some_and(|min| artifact_time < min) {
            return false;
        }

        for source in sources {
            match modified(source) {
                Some(source_time) if source_time <= artifact_time => {}
                _ => return false,
            }
        }

        match self.strategy {
            CacheStrategy::Timestamp => true,
            CacheStrategy::ContentHash => Self::fingerprint_matches(artifact, sources),
        }
    }

    /// Records a successful build. Only the content-hash strategy stores anything.
    pub fn record(&self, artifact: &Path, sources: &[PathBuf]) -> Result<()> {
        if self.strategy != CacheStrategy::ContentHash {
            return Ok(());
        }

        let fingerprint = Fingerprint::compute(sources)?;
        let content =
            serde_json::to_string_pretty(&fingerprint).map_err(std::io::Error::other)?;
        fs::write(Self::fingerprint_path(artifact), content)?;
        Ok(())
    }

    /// Removes an artifact and its fingerprint, forcing the next run to rebuild.
    /// Returns true if anything was deleted.
    pub fn invalidate(artifact: &Path) -> Result<bool> {
        let mut removed = false;

        for path in [artifact.to_path_buf(), Self::fingerprint_path(artifact)] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }

    /// Sidecar file holding the fingerprint of `artifact`.
    pub fn fingerprint_path(artifact: &Path) -> PathBuf {
        let mut name = artifact.file_name().unwrap_or_default().to_os_string();
        name.push(".fingerprint.json");
        artifact.with_file_name(name)
    }

    fn fingerprint_matches(artifact: &Path, sources: &[PathBuf]) -> bool {
        let recorded = match fs::read_to_string(Self::fingerprint_path(artifact)) {
            Ok(content) => match serde_json::from_str::<Fingerprint>(&content) {
                Ok(f) => f,
                Err(_) => return false,
            },
            Err(_) => return false,
        };

        match Fingerprint::compute(sources) {
            Ok(current) => current == recorded,
            Err(_) => false,
        }
    }
}

impl Fingerprint {
    /// Hashes every source file.
    pub fn compute(sources: &[PathBuf]) -> Result<Self> {
        let mut hashes = BTreeMap::new();
        for source in sources {
            hashes.insert(source.clone(), hash_file(source)?);
        }
        Ok(Self { sources: hashes })
    }
}

/// Newest modification time across `paths`. A path that cannot be inspected
/// counts as modified now, so artifacts built against it are rebuilt.
pub fn newest_modification<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<SystemTime> {
    paths
        .into_iter()
        .map(|p| modified(p).unwrap_or_else(SystemTime::now))
        .max()
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Hashes a file using blake3.
fn hash_file(path: &Path) -> Result<String> {
    let content = fs::read(path)?;
    let hash = blake3::hash(&content);
    Ok(hash.to_hex().to_string())
}
