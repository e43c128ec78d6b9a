//! ModForge CLI - Command-line interface for the ModForge plugin orchestrator.

mod commands;
mod discovery;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::Result;

#[derive(Parser)]
#[command(name = "modforge")]
#[command(
    author,
    version,
    about = "Compiles, loads and initializes source plugins"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Mods directory (auto-detected if not specified)
    #[arg(short, long, global = true)]
    mods: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, load and initialize every plugin
    Run {
        /// Recompile even when artifacts are up to date
        #[arg(short, long)]
        force: bool,

        /// Exit with an error if any plugin fails
        #[arg(long)]
        strict: bool,
    },

    /// List discovered plugins
    List {
        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Check manifests, the reference set and the compiler
    Validate,

    /// Artifact cache management
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Scaffold a new plugin directory
    Init {
        /// Plugin name
        name: String,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete built artifacts and fingerprints
    Clean,

    /// Show which artifacts are up to date
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mods_root = match cli.mods {
        Some(path) => path,
        None => discovery::find_mods_root()?,
    };

    match cli.command {
        Some(Commands::Run { force, strict }) => {
            commands::run::execute(&mods_root, force, strict, cli.verbose).await
        }

        Some(Commands::List { detailed }) => commands::list::execute(&mods_root, detailed),

        Some(Commands::Validate) => commands::validate::execute(&mods_root).await,

        Some(Commands::Cache { action }) => match action {
            CacheAction::Clean => commands::cache::clean(&mods_root),
            CacheAction::Status => commands::cache::status(&mods_root).await,
        },

        Some(Commands::Init { name, force }) => commands::init::execute(&mods_root, &name, force),

        None => commands::run::execute(&mods_root, false, false, cli.verbose).await,
    }
}
