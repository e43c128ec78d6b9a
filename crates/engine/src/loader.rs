//! Dynamic loading of plugin artifacts and entry point resolution.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use modforge_plugin::{API_VERSION, DECLARATION_NAME, DECLARATION_SYMBOL, PluginDeclaration};
use thiserror::Error;
use tracing::debug;

/// Error loading an artifact as a library.
#[derive(Debug, Error)]
#[error("Failed to load library {path}: {reason}")]
pub struct LoadError {
    pub path: PathBuf,
    pub reason: String,
}

/// The plugin does not honour the entry point contract.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Can't find exported static `{symbol}` in {path}")]
    MissingDeclaration { symbol: &'static str, path: PathBuf },

    #[error("Plugin API version {found} does not match host version {expected}")]
    ApiVersion { found: u32, expected: u32 },
}

impl ContractError {
    /// Describes exactly what the plugin was expected to provide.
    pub fn expected(&self) -> String {
        match self {
            ContractError::MissingDeclaration { symbol, .. } => format!(
                "static `{}: modforge_plugin::PluginDeclaration` (use `modforge_plugin::declare_plugin!`)",
                symbol
            ),
            ContractError::ApiVersion { found, expected } => format!(
                "`{}` declaring API version {} (found {})",
                DECLARATION_NAME, expected, found
            ),
        }
    }
}

/// A loaded plugin artifact.
pub trait PluginModule {
    /// Resolves the plugin's declaration.
    fn declaration(&self) -> Result<PluginDeclaration, ContractError>;
}

/// Loads plugin artifacts into the running process.
pub trait ModuleLoader {
    type Module: PluginModule;

    fn load(&self, artifact: &Path) -> Result<Self::Module, LoadError>;
}

/// Checks a declaration against the host's API version.
pub fn check_declaration(declaration: PluginDeclaration) -> Result<PluginDeclaration, ContractError> {
    if declaration.api_version != API_VERSION {
        return Err(ContractError::ApiVersion {
            found: declaration.api_version,
            expected: API_VERSION,
        });
    }
    Ok(declaration)
}

/// Loads artifacts as shared libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DylibLoader;

/// A shared library that stays mapped for as long as this value lives.
pub struct DylibModule {
    library: Library,
    path: PathBuf,
}

impl DylibModule {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModuleLoader for DylibLoader {
    type Module = DylibModule;

    fn load(&self, artifact: &Path) -> Result<DylibModule, LoadError> {
        debug!(path = %artifact.display(), "loading library");

        // Safety: running a plugin's initializers is the point of loading it.
        let library = unsafe { Library::new(artifact) }.map_err(|e| LoadError {
            path: artifact.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(DylibModule {
            library,
            path: artifact.to_path_buf(),
        })
    }
}

impl PluginModule for DylibModule {
    fn declaration(&self) -> Result<PluginDeclaration, ContractError> {
        let missing = || ContractError::MissingDeclaration {
            symbol: DECLARATION_NAME,
            path: self.path.clone(),
        };

        // Safety: the symbol is the address of a `PluginDeclaration` static
        // exported by `declare_plugin!`; the layout is `repr(C)`.
        let declaration = unsafe {
            let symbol: Symbol<*const PluginDeclaration> = self
                .library
                .get(DECLARATION_SYMBOL)
                .map_err(|_| missing())?;

            let ptr = *symbol;
            if ptr.is_null() {
                return Err(missing());
            }
            *ptr
        };

        check_declaration(declaration)
    }
}

impl Drop for DylibModule {
    fn drop(&mut self) {
        debug!("Unloading plugin library: {:?}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::tests::{PLUGIN_SOURCE, compile_source};
    use modforge_plugin::{Plugin, PluginContext, PluginResult};

    struct Noop;

    impl Plugin for Noop {
        fn initialize(_: &PluginContext<'_>) -> PluginResult {
            Ok(())
        }
    }

    #[test]
    fn test_check_declaration_accepts_current_version() {
        let declaration = PluginDeclaration::new::<Noop>();
        assert!(check_declaration(declaration).is_ok());
    }

    #[test]
    fn test_check_declaration_rejects_other_version() {
        let mut declaration = PluginDeclaration::new::<Noop>();
        declaration.api_version = API_VERSION + 1;

        let err = check_declaration(declaration).unwrap_err();
        assert!(matches!(err, ContractError::ApiVersion { .. }));
        assert!(err.expected().contains(DECLARATION_NAME));
    }

    #[test]
    fn test_missing_declaration_names_expectation() {
        let err = ContractError::MissingDeclaration {
            symbol: DECLARATION_NAME,
            path: PathBuf::from("/mods/Foo/Foo.so"),
        };
        assert!(err.expected().contains("MODFORGE_PLUGIN"));
        assert!(err.expected().contains("declare_plugin!"));
    }

    #[test]
    fn test_loading_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("Broken.so");
        std::fs::write(&artifact, b"not a shared library").unwrap();

        let err = DylibLoader.load(&artifact).err().unwrap();
        assert_eq!(err.path, artifact);
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn test_loading_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DylibLoader.load(&dir.path().join("Missing.so")).is_err());
    }

    #[tokio::test]
    async fn test_compiled_plugin_loads_and_initializes() {
        let dir = tempfile::tempdir().unwrap();
        let (library, output) = compile_source(dir.path(), "control", PLUGIN_SOURCE).await;
        assert!(output.success, "rustc failed:\n{}", output.diagnostics);

        let module = DylibLoader.load(&library).unwrap();
        assert_eq!(module.path(), library);
        let declaration = module.declaration().unwrap();
        assert_eq!(declaration.api_version, API_VERSION);

        let context = PluginContext::new("Control", dir.path(), r#"{"logLevel":"info"}"#);
        // Safety: `module` keeps the library mapped for the call.
        unsafe { declaration.call(&context) }.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("initialized.txt")).unwrap(),
            r#"{"logLevel":"info"}"#
        );
    }

    #[tokio::test]
    async fn test_library_without_declaration_is_contract_error() {
        let dir = tempfile::tempdir().unwrap();
        let (library, output) =
            compile_source(dir.path(), "plain", "pub fn helper() -> u32 { 1 }").await;
        assert!(output.success, "rustc failed:\n{}", output.diagnostics);

        let module = DylibLoader.load(&library).unwrap();
        match module.declaration() {
            Err(ContractError::MissingDeclaration { symbol, path }) => {
                assert_eq!(symbol, DECLARATION_NAME);
                assert_eq!(path, library);
            }
            Err(other) => panic!("expected missing declaration, got {}", other),
            Ok(_) => panic!("expected missing declaration"),
        }
    }
}
