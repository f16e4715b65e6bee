//! Helpers shared across CLI commands.

use std::path::Path;

use manifest_fetch::config::ConfigFile;

use crate::error::CliError;

/// Load the config from `path`, or from the default location when no path
/// was given.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Check every requested platform against the config's platform table.
///
/// An empty request selects every known platform. Repeated platforms are
/// kept once, in first-seen order.
pub fn select_platforms(config: &ConfigFile, requested: &[String]) -> Result<Vec<String>, CliError> {
    if requested.is_empty() {
        return Ok(config.platform_names());
    }

    let unknown: Vec<&str> = requested
        .iter()
        .filter(|p| !config.platforms.contains_key(p.as_str()))
        .map(String::as_str)
        .collect();

    if !unknown.is_empty() {
        return Err(CliError::Config(format!(
            "Unknown platform(s) {}. Known platforms: {}",
            unknown.join(", "),
            config.platform_names().join(", ")
        )));
    }

    let mut selected: Vec<String> = Vec::with_capacity(requested.len());
    for platform in requested {
        if !selected.contains(platform) {
            selected.push(platform.clone());
        }
    }
    Ok(selected)
}
