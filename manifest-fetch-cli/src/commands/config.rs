//! Configuration CLI commands.
//!
//! `config path` prints where the config file is read from and `config show`
//! prints the effective settings in config file syntax.

use std::fmt::Write;

use clap::Subcommand;
use manifest_fetch::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: &ConfigFile) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => {
            print!("{}", render(config));
            Ok(())
        }
    }
}

fn run_path() -> Result<(), CliError> {
    let path = ConfigFile::default_path()
        .ok_or_else(|| CliError::Config("no configuration directory on this platform".to_string()))?;
    let note = if path.exists() { "" } else { " (not created)" };
    println!("{}{}", path.display(), note);
    Ok(())
}

/// Render `config` as INI.
fn render(config: &ConfigFile) -> String {
    let backoff: Vec<String> = config
        .backoff
        .delays()
        .iter()
        .map(|d| d.as_secs().to_string())
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "[download]");
    let _ = writeln!(out, "timeout = {}", config.timeout.as_secs());
    let _ = writeln!(out, "backoff = {}", backoff.join(", "));
    let _ = writeln!(out);
    let _ = writeln!(out, "[platforms]");
    for (platform, package) in &config.platforms {
        let _ = writeln!(out, "{} = {}", platform, package);
    }
    out
}
