//! ModForge Plugin - interface crate plugins are compiled against.
//!
//! A plugin is a crate whose sources live in `<ModDir>/source/`. ModForge
//! compiles it into a `cdylib` linked against this crate, loads the result and
//! calls [`Plugin::initialize`] once per run:
//!
//! ```ignore
//! use modforge_plugin::{Plugin, PluginContext, PluginResult, declare_plugin};
//!
//! struct Control;
//!
//! impl Plugin for Control {
//!     fn initialize(ctx: &PluginContext<'_>) -> PluginResult {
//!         println!("{} loaded from {}", ctx.name(), ctx.mod_dir().display());
//!         Ok(())
//!     }
//! }
//!
//! declare_plugin!(Control);
//! ```

mod ffi;

use std::error::Error;
use std::path::Path;

pub use ffi::{
    ErrorSink, InitFailure, InitStatus, InitializeFn, PluginDeclaration, RawContext, RawStr,
};

/// Version of the declaration layout. Bumped on any incompatible change.
pub const API_VERSION: u32 = 1;

/// Name of the static exported by [`declare_plugin!`].
pub const DECLARATION_NAME: &str = "MODFORGE_PLUGIN";

/// [`DECLARATION_NAME`] as a nul-terminated symbol.
pub const DECLARATION_SYMBOL: &[u8] = b"MODFORGE_PLUGIN\0";

/// Result returned from [`Plugin::initialize`].
pub type PluginResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Entry point every plugin implements.
pub trait Plugin {
    /// Called once per run after the plugin's library has been loaded.
    ///
    /// Errors are reported with their full `source()` chain; panics are caught
    /// and reported as failures.
    fn initialize(ctx: &PluginContext<'_>) -> PluginResult;
}

/// Information handed to a plugin at initialization.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    name: &'a str,
    mod_dir: &'a Path,
    config: &'a str,
}

impl<'a> PluginContext<'a> {
    pub fn new(name: &'a str, mod_dir: &'a Path, config: &'a str) -> Self {
        Self {
            name,
            mod_dir,
            config,
        }
    }

    /// Plugin name (its directory name).
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The plugin's own directory.
    pub fn mod_dir(&self) -> &'a Path {
        self.mod_dir
    }

    /// The plugin's settings document as JSON, `{}` when it has none.
    ///
    /// The document is re-serialized by the host, so `logLevel` comes back
    /// normalized: `"Log"` reads as `"info"`, and unknown names as `"debug"`.
    pub fn config_json(&self) -> &'a str {
        self.config
    }
}

/// Exports the declaration for a [`Plugin`] implementation.
#[macro_export]
macro_rules! declare_plugin {
    ($plugin:ty) => {
        #[unsafe(no_mangle)]
        pub static MODFORGE_PLUGIN: $crate::PluginDeclaration =
            $crate::PluginDeclaration::new::<$plugin>();
    };
}
