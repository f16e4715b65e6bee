//! URL validation against the host allow-list.
//!
//! Every URL this crate contacts passes through [`ManifestUrlGuard::validate`]
//! first. A URL that fails validation never leaves the process.

use reqwest::Url;
use tracing::warn;

use crate::error::{FetchError, FetchResult};

/// Hosts that serve manifests and artifacts by default.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 2] = ["snapshots.elastic.co", "staging.elastic.co"];

/// Immutable set of hosts the guard permits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedHosts(Vec<String>);

impl AllowedHosts {
    /// Creates an allow-list from the given hosts.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for host in hosts {
            let host = host.into();
            if !list.contains(&host) {
                list.push(host);
            }
        }
        Self(list)
    }

    /// Exact membership test.
    ///
    /// [`ManifestUrlGuard::validate`] passes hosts as the URL parser
    /// normalises them, so http(s) hosts arrive lowercased.
    pub fn contains(&self, host: &str) -> bool {
        self.0.iter().any(|h| h == host)
    }

    /// The permitted hosts, in the order they were given.
    pub fn hosts(&self) -> &[String] {
        &self.0
    }
}

impl Default for AllowedHosts {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS)
    }
}

/// Validates and canonicalizes URLs against an [`AllowedHosts`] list.
#[derive(Debug, Clone, Default)]
pub struct ManifestUrlGuard {
    allowed: AllowedHosts,
}

impl ManifestUrlGuard {
    /// Creates a guard for the given allow-list.
    pub fn new(allowed: AllowedHosts) -> Self {
        Self { allowed }
    }

    /// The allow-list this guard enforces.
    pub fn allowed_hosts(&self) -> &AllowedHosts {
        &self.allowed
    }

    /// Validates `raw` and returns its canonical form.
    ///
    /// The canonical URL is rebuilt as `https://{host}{path}`: the scheme is
    /// forced to https and any query string or fragment is dropped. Hosts
    /// are compared after parsing, which lowercases http(s) hosts, so
    /// `SNAPSHOTS.elastic.co` matches `snapshots.elastic.co`.
    pub fn validate(&self, raw: &str) -> FetchResult<String> {
        let parsed = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        if !self.allowed.contains(&host) {
            warn!(
                host = %host,
                allowed = ?self.allowed.hosts(),
                "Host not allowed"
            );
            return Err(FetchError::HostNotAllowed {
                host,
                allowed: self.allowed.hosts().to_vec(),
            });
        }

        Ok(format!("https://{}{}", host, parsed.path()))
    }
}
