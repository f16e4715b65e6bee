//! Build manifest document model.
//!
//! Only the fields this crate consults are modelled; unknown fields are
//! ignored and missing ones default to empty.

use std::collections::BTreeMap;

use serde::Deserialize;

/// A decoded build manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Version shared by every package in the build (e.g. `8.9.0-SNAPSHOT`).
    pub version: String,

    /// Identifier of the build that produced the manifest.
    pub build_id: String,

    /// Version of the manifest format.
    pub manifest_version: String,

    /// Projects keyed by component name.
    pub projects: BTreeMap<String, Project>,
}

/// A project (component) within a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Project {
    pub branch: String,
    pub commit_hash: String,

    /// Packages keyed by `{package}-{version}-{platform package name}`.
    pub packages: BTreeMap<String, PackageEntry>,
}

/// Artifact locations for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackageEntry {
    pub url: String,
    pub sha_url: String,
    pub asc_url: String,
}

impl Manifest {
    /// Decodes a manifest from its JSON body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Looks up the project for `component`.
    pub fn project(&self, component: &str) -> Option<&Project> {
        self.projects.get(component)
    }
}
