//! manifest-fetch - build manifest resolution and artifact downloads
//!
//! This library fetches a remote build manifest, resolves which artifacts a
//! set of components needs on a set of platforms, and downloads them
//! concurrently into a local directory. Every URL is checked against a host
//! allow-list, every request is retried over a fixed backoff schedule, and
//! all download failures are reported together.
//!
//! # Example
//!
//! ```ignore
//! use manifest_fetch::config::ConfigFile;
//! use manifest_fetch::download_components_from_manifest;
//!
//! let config = ConfigFile::load()?;
//! let report = download_components_from_manifest(
//!     "https://snapshots.elastic.co/8.9.0-abc/manifest-8.9.0.json",
//!     &config.platform_names(),
//!     &config.platform_packages(),
//!     "build/drop".as_ref(),
//! )
//! .await?;
//! ```

pub mod client;
pub mod components;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod group;
pub mod guard;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod resolver;
pub mod retry;

pub use client::{HttpClient, ReqwestClient};
pub use components::ComponentSpec;
pub use error::{FetchError, FetchResult};
pub use fetcher::ManifestFetcher;
pub use guard::{AllowedHosts, ManifestUrlGuard};
pub use manifest::{Manifest, PackageEntry, Project};
pub use orchestrator::{
    download_components_from_manifest, download_manifest, DownloadOrchestrator, DownloadReport,
    DownloadRequest,
};
pub use resolver::PackageUrls;
pub use retry::{BackoffSchedule, RetryingExecutor, Sleeper};
