//! Error types for ModForge.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ModForge operations.
pub type Result<T> = std::result::Result<T, ModforgeError>;

/// Main error type for ModForge.
#[derive(Debug, Error)]
pub enum ModforgeError {
    #[error("Mods directory not found: {0}")]
    ModsRootNotFound(PathBuf),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Invalid settings {path}: {message}")]
    Settings { path: PathBuf, message: String },

    #[error("Invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Runtime library directory could not be resolved: {0}")]
    RuntimeAnchor(String),

    #[error("Interface library not found: {0}")]
    InterfaceLibraryNotFound(String),

    #[error("Compiler not found: {0}")]
    CompilerNotFound(String),

    #[error("Could not run compiler {program}: {source}")]
    CompilerSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
