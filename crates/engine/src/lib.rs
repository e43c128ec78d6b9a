//! ModForge Engine - Builds, loads and initializes plugins from source.

mod cache;
mod compiler;
mod discovery;
mod loader;
mod logging;
mod orchestrator;
mod references;

pub use cache::{ArtifactCache, Fingerprint, newest_modification};
pub use compiler::{CompileOutput, CompileRequest, Compiler, RustcCompiler};
pub use discovery::discover;
pub use loader::{
    ContractError, DylibLoader, DylibModule, LoadError, ModuleLoader, PluginModule,
    check_declaration,
};
pub use logging::{HostLog, LOG_ENV, PluginLog, level_filter};
pub use orchestrator::Orchestrator;
pub use references::{
    INTERFACE_CRATE, Reference, ReferenceSet, ReferenceSetBuilder, RuntimeSource,
};
