//! manifest-fetch CLI - Command-line interface
//!
//! Downloads the component artifacts listed in a build manifest so they can
//! be packaged afterwards.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use manifest_fetch::{logging, DownloadOrchestrator};

use commands::common::load_config;
use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "manifest-fetch", version, about, long_about = None)]
struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output for manifest resolution and downloads
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch a manifest and print its summary
    Show {
        /// Manifest URL
        manifest_url: String,
    },

    /// Download every component artifact a manifest lists
    Download {
        /// Manifest URL
        manifest_url: String,

        /// Directory to download into (created if missing)
        #[arg(short, long)]
        dest: PathBuf,

        /// Platform to download, e.g. linux/amd64 (repeatable; default: all)
        #[arg(short, long = "platform")]
        platforms: Vec<String>,

        /// Per-request timeout in seconds (overrides the config file)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Show { manifest_url } => {
            let orchestrator = build_orchestrator(&config)?;
            commands::show::run(&orchestrator, &manifest_url).await
        }
        Commands::Download {
            manifest_url,
            dest,
            platforms,
            timeout,
        } => {
            if let Some(secs) = timeout {
                config.timeout = Duration::from_secs(secs);
            }
            let orchestrator = build_orchestrator(&config)?;
            let args = DownloadArgs {
                manifest_url,
                dest,
                platforms,
            };
            commands::download::run(&orchestrator, &config, args).await
        }
        Commands::Config { command } => commands::config::run(command, &config),
    }
}

fn build_orchestrator(
    config: &manifest_fetch::config::ConfigFile,
) -> Result<DownloadOrchestrator<manifest_fetch::ReqwestClient>, CliError> {
    let client = config.client()?;
    Ok(DownloadOrchestrator::new(Arc::new(client)).with_executor(config.executor()))
}
