//! Resolution of a package request into concrete artifact URLs.

use tracing::debug;

use crate::manifest::Project;

/// Artifact URLs for one resolved package: binary, checksum and signature.
///
/// Entries may be empty strings when the manifest omits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUrls([String; 3]);

impl PackageUrls {
    /// The artifact URL.
    pub fn url(&self) -> &str {
        &self.0[0]
    }

    /// The checksum URL.
    pub fn sha_url(&self) -> &str {
        &self.0[1]
    }

    /// The signature URL.
    pub fn asc_url(&self) -> &str {
        &self.0[2]
    }

    /// All three URLs in order, empty ones included.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// The non-empty URLs in order; these are the download targets.
    pub fn artifacts(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|u| !u.is_empty())
    }
}

/// Composite package key used by manifests: `{package}-{version}-{platform}`.
pub fn package_key(package: &str, version: &str, platform_package: &str) -> String {
    format!("{}-{}-{}", package, version, platform_package)
}

/// Resolves `package` for `platform_package` at `version` within `project`.
///
/// Returns `None` when the project does not ship that package for that
/// platform. This is an expected outcome, not an error.
pub fn resolve(
    project: &Project,
    package: &str,
    platform_package: &str,
    version: &str,
) -> Option<PackageUrls> {
    let key = package_key(package, version, platform_package);
    let entry = project.packages.get(&key)?;

    debug!(
        branch = %project.branch,
        commit = %project.commit_hash,
        key = %key,
        "Resolved package"
    );

    Some(PackageUrls([
        entry.url.clone(),
        entry.sha_url.clone(),
        entry.asc_url.clone(),
    ]))
}
