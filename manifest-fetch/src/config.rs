//! Configuration file support.
//!
//! Settings are read from an INI file, by default
//! `~/.config/manifest-fetch/config.ini` on Linux:
//!
//! ```ini
//! [download]
//! ; per-request timeout in seconds
//! timeout = 300
//! ; delays between attempts in seconds
//! backoff = 1, 3, 10
//!
//! [platforms]
//! linux/amd64 = linux-x86_64.tar.gz
//! ```
//!
//! Every setting is optional. Entries under `[platforms]` override or extend
//! the built-in platform table.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use crate::client::{ReqwestClient, DEFAULT_TIMEOUT_SECS};
use crate::error::{FetchError, FetchResult};
use crate::retry::{BackoffSchedule, RetryingExecutor};

/// Directory name under the platform config directory.
const APP_DIR: &str = "manifest-fetch";

/// Config file name.
const CONFIG_FILE: &str = "config.ini";

/// Built-in platform to package name table.
pub const DEFAULT_PLATFORM_PACKAGES: [(&str, &str); 5] = [
    ("darwin/amd64", "darwin-x86_64.tar.gz"),
    ("darwin/arm64", "darwin-aarch64.tar.gz"),
    ("linux/amd64", "linux-x86_64.tar.gz"),
    ("linux/arm64", "linux-arm64.tar.gz"),
    ("windows/amd64", "windows-x86_64.zip"),
];

/// Loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Per-request HTTP timeout.
    pub timeout: Duration,

    /// Delays between download attempts.
    pub backoff: BackoffSchedule,

    /// Platform (e.g. `linux/amd64`) to package name suffix.
    pub platforms: BTreeMap<String, String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            backoff: BackoffSchedule::default(),
            platforms: DEFAULT_PLATFORM_PACKAGES
                .iter()
                .map(|(p, n)| (p.to_string(), n.to_string()))
                .collect(),
        }
    }
}

impl ConfigFile {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads the config from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> FetchResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads the config from `path`, which must exist.
    pub fn load_from(path: &Path) -> FetchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| config_error(path, io_reason(&e)))?;
        let config = Self::parse(&content, path)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses INI `content`; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> FetchResult<Self> {
        let ini = Ini::load_from_str(content).map_err(|e| config_error(path, e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            if let Some(value) = section.get("timeout") {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| config_error(path, format!("invalid timeout {:?}", value)))?;
                config.timeout = Duration::from_secs(secs);
            }

            if let Some(value) = section.get("backoff") {
                config.backoff = parse_backoff(value)
                    .ok_or_else(|| config_error(path, format!("invalid backoff {:?}", value)))?;
            }
        }

        if let Some(section) = ini.section(Some("platforms")) {
            for (platform, package) in section.iter() {
                let package = package.trim();
                if package.is_empty() {
                    return Err(config_error(
                        path,
                        format!("empty package name for platform {:?}", platform),
                    ));
                }
                config
                    .platforms
                    .insert(platform.trim().to_string(), package.to_string());
            }
        }

        Ok(config)
    }

    /// The platform table as the orchestrator consumes it.
    pub fn platform_packages(&self) -> HashMap<String, String> {
        self.platforms
            .iter()
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect()
    }

    /// Every configured platform, sorted.
    pub fn platform_names(&self) -> Vec<String> {
        self.platforms.keys().cloned().collect()
    }

    /// Retry executor using the configured backoff.
    pub fn executor(&self) -> RetryingExecutor {
        RetryingExecutor::new(self.backoff.clone())
    }

    /// HTTP client using the configured timeout.
    pub fn client(&self) -> FetchResult<ReqwestClient> {
        ReqwestClient::with_timeout(self.timeout)
    }
}

/// Parses a comma separated list of whole seconds.
fn parse_backoff(value: &str) -> Option<BackoffSchedule> {
    let secs = value
        .split(',')
        .map(|s| s.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    BackoffSchedule::from_secs(&secs)
}

fn io_reason(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "file not found".to_string(),
        _ => err.to_string(),
    }
}

fn config_error(path: &Path, reason: String) -> FetchError {
    FetchError::Config {
        path: path.to_path_buf(),
        reason,
    }
}
