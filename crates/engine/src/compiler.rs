//! Compiler invocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use modforge_core::{CompilerConfig, ModforgeError, Result};
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::references::ReferenceSet;

/// Everything needed to compile one plugin.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    /// Crate name of the produced library.
    pub crate_name: &'a str,

    /// File the library is written to.
    pub output: &'a Path,

    /// Libraries to compile against.
    pub references: &'a ReferenceSet,

    /// Every source file of the plugin.
    pub sources: &'a [PathBuf],

    /// Source file the compiler is pointed at.
    pub crate_root: &'a Path,
}

/// Result of a compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub success: bool,

    /// Everything the compiler printed, captured rather than inherited.
    pub diagnostics: String,
}

/// A compiler backend.
///
/// `Err` means the compiler could not be run at all; a run that rejects the
/// sources returns `Ok` with `success == false`.
#[allow(async_fn_in_trait)]
pub trait Compiler {
    async fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput>;
}

/// Compiles plugins into `cdylib`s by spawning `rustc`.
#[derive(Debug, Clone)]
pub struct RustcCompiler {
    program: PathBuf,
    edition: String,
    extra_args: Vec<String>,
}

impl RustcCompiler {
    /// Creates a compiler for the given program, used as-is.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            edition: CompilerConfig::default().edition,
            extra_args: Vec::new(),
        }
    }

    /// Creates a compiler from configuration, resolving the program on `PATH`.
    pub fn from_config(config: &CompilerConfig) -> Result<Self> {
        let program = which::which(&config.program).map_err(|e| {
            ModforgeError::CompilerNotFound(format!("{}: {}", config.program.display(), e))
        })?;

        Ok(Self::new(program)
            .with_edition(config.edition.clone())
            .with_extra_args(config.extra_args.clone()))
    }

    /// Sets the language edition.
    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = edition.into();
        self
    }

    /// Adds arguments appended after the fixed template.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Builds the argument list for a request.
    ///
    /// The fixed template produces an optimized dynamic library without debug
    /// info at the requested path, followed by one `-L` per reference
    /// directory, one `--extern` per reference and the crate root.
    pub fn arguments(&self, request: &CompileRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--crate-type=cdylib".to_string(),
            format!("--crate-name={}", request.crate_name),
            format!("--edition={}", self.edition),
            "-Copt-level=3".to_string(),
            "-Cdebuginfo=0".to_string(),
            "--color=never".to_string(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push("-o".into());
        args.push(request.output.into());

        for dir in request.references.search_dirs() {
            let mut flag = OsString::from("dependency=");
            flag.push(dir);
            args.push("-L".into());
            args.push(flag);
        }

        for reference in request.references.iter() {
            let mut flag = OsString::from(format!("{}=", reference.crate_name));
            flag.push(&reference.path);
            args.push("--extern".into());
            args.push(flag);
        }

        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(request.crate_root.into());
        args
    }
}

impl Compiler for RustcCompiler {
    async fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput> {
        let args = self.arguments(request);
        debug!(program = %self.program.display(), ?args, "invoking compiler");

        let output = TokioCommand::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ModforgeError::CompilerSpawn {
                program: self.program.clone(),
                source: e,
            })?;

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

        Ok(CompileOutput {
            success: output.status.success(),
            diagnostics,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::references::{Reference, ReferenceSetBuilder};
    use modforge_core::ReferenceConfig;

    /// A plugin that records its configuration next to itself.
    pub(crate) const PLUGIN_SOURCE: &str = r#"
use modforge_plugin::{Plugin, PluginContext, PluginResult, declare_plugin};

struct Control;

impl Plugin for Control {
    fn initialize(ctx: &PluginContext<'_>) -> PluginResult {
        std::fs::write(ctx.mod_dir().join("initialized.txt"), ctx.config_json())?;
        Ok(())
    }
}

declare_plugin!(Control);
"#;

    /// Compiles `source` with the `rustc` on `PATH` against the real
    /// reference set, returning the library path and the compiler result.
    pub(crate) async fn compile_source(
        dir: &Path,
        crate_name: &str,
        source: &str,
    ) -> (PathBuf, CompileOutput) {
        let compiler = RustcCompiler::from_config(&CompilerConfig::default()).unwrap();
        let references =
            ReferenceSetBuilder::from_config(&ReferenceConfig::default(), compiler.program())
                .build()
                .await
                .unwrap();

        let crate_root = dir.join(format!("{}.rs", crate_name));
        std::fs::write(&crate_root, source).unwrap();
        let output = dir.join(format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            crate_name,
            std::env::consts::DLL_SUFFIX
        ));
        let sources = vec![crate_root.clone()];

        let request = CompileRequest {
            crate_name,
            output: &output,
            references: &references,
            sources: &sources,
            crate_root: &crate_root,
        };
        let result = compiler.compile(&request).await.unwrap();
        (output, result)
    }

    fn request<'a>(references: &'a ReferenceSet, sources: &'a [PathBuf]) -> CompileRequest<'a> {
        CompileRequest {
            crate_name: "foo",
            output: Path::new("/mods/Foo/Foo.so.partial"),
            references,
            sources,
            crate_root: Path::new("/mods/Foo/source/lib.rs"),
        }
    }

    #[test]
    fn test_argument_template() {
        let references = ReferenceSet::new(vec![
            Reference::from_path("/rt/libhashbrown-aa.rlib").unwrap(),
            Reference::from_path("/host/libmodforge_plugin-bb.rlib").unwrap(),
        ]);
        let sources = vec![PathBuf::from("/mods/Foo/source/lib.rs")];

        let compiler = RustcCompiler::new("rustc").with_extra_args(vec!["--cfg=modded".into()]);
        let args: Vec<String> = compiler
            .arguments(&request(&references, &sources))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "--crate-type=cdylib",
                "--crate-name=foo",
                "--edition=2021",
                "-Copt-level=3",
                "-Cdebuginfo=0",
                "--color=never",
                "-o",
                "/mods/Foo/Foo.so.partial",
                "-L",
                "dependency=/rt",
                "-L",
                "dependency=/host",
                "--extern",
                "hashbrown=/rt/libhashbrown-aa.rlib",
                "--extern",
                "modforge_plugin=/host/libmodforge_plugin-bb.rlib",
                "--cfg=modded",
                "/mods/Foo/source/lib.rs",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let references = ReferenceSet::default();
        let sources = Vec::new();
        let compiler = RustcCompiler::new("/definitely/not/a/compiler");

        let result = compiler.compile(&request(&references, &sources)).await;
        assert!(matches!(result, Err(ModforgeError::CompilerSpawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        // `false` ignores its arguments and exits non-zero.
        let references = ReferenceSet::default();
        let sources = Vec::new();
        let compiler = RustcCompiler::new("false");

        let output = compiler.compile(&request(&references, &sources)).await.unwrap();
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_rustc_builds_plugin_library() {
        let dir = tempfile::tempdir().unwrap();
        let (library, output) = compile_source(dir.path(), "control", PLUGIN_SOURCE).await;

        assert!(output.success, "rustc failed:\n{}", output.diagnostics);
        assert!(library.is_file());
    }

    #[tokio::test]
    async fn test_failure_captures_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let (library, output) = compile_source(dir.path(), "broken", "this is not rust").await;

        assert!(!output.success);
        assert!(output.diagnostics.contains("error"));
        assert!(output.diagnostics.contains("broken.rs"));
        assert!(!library.exists());
    }

    #[test]
    fn test_unknown_program_not_resolved() {
        let config = CompilerConfig {
            program: PathBuf::from("modforge-no-such-rustc"),
            ..Default::default()
        };
        assert!(matches!(
            RustcCompiler::from_config(&config),
            Err(ModforgeError::CompilerNotFound(_))
        ));
    }
}
