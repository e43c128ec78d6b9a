//! Mods directory discovery logic.

use std::path::{Path, PathBuf};

use miette::{Result, miette};
use modforge_core::CONFIG_FILE;

/// Conventional name of the mods directory.
const MODS_DIR_NAME: &str = "mods";

/// Finds the mods directory starting from the current directory.
pub fn find_mods_root() -> Result<PathBuf> {
    find_mods_root_from(
        &std::env::current_dir().map_err(|e| miette!("Cannot get current directory: {}", e))?,
    )
}

/// Finds the mods directory starting from the given directory.
///
/// The nearest directory (searching upwards) holding a `modforge.json` wins;
/// otherwise a `mods` subdirectory of `start`, otherwise `start` itself.
pub fn find_mods_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let mods = start.join(MODS_DIR_NAME);
    if mods.is_dir() {
        return Ok(mods);
    }

    if start.is_dir() {
        Ok(start.to_path_buf())
    } else {
        Err(miette!("Mods directory {} does not exist", start.display()))
    }
}
