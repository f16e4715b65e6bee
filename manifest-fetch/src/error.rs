//! Error types for manifest fetching and artifact downloads.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::retry::Cancelled;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while fetching a manifest or its artifacts.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL's host is not in the allow-list.
    #[error("host {host:?} is not allowed, valid hosts are {allowed:?}")]
    HostNotAllowed { host: String, allowed: Vec<String> },

    /// The request failed or returned a non-success status.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The manifest body could not be decoded.
    #[error("failed to decode manifest from {url}: {reason}")]
    ManifestDecode { url: String, reason: String },

    /// The manifest could not be validated, fetched or decoded.
    #[error("downloading manifest {url}: {source}")]
    ManifestFetchFailed {
        url: String,
        #[source]
        source: Box<FetchError>,
    },

    /// The destination directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A downloaded body could not be written to disk.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An artifact still failed after the retry budget was spent.
    #[error("failed to download {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: Box<FetchError>,
    },

    /// The shared cancellation signal fired before the work could finish.
    #[error("download cancelled")]
    Cancelled,

    /// A download task panicked.
    #[error("download task panicked: {0}")]
    TaskPanicked(String),

    /// One or more artifact downloads failed.
    #[error("error downloading files: {}", summarize(failures))]
    DownloadsFailed { failures: Vec<FetchError> },

    /// The configuration file is unreadable or malformed.
    #[error("invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl FetchError {
    /// Wrap an error as a manifest fetch failure for `url`.
    pub(crate) fn manifest(url: &str, source: FetchError) -> Self {
        Self::ManifestFetchFailed {
            url: url.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap an error as a download failure for `url`.
    pub(crate) fn download(url: &str, source: FetchError) -> Self {
        Self::DownloadFailed {
            url: url.to_string(),
            source: Box::new(source),
        }
    }

    /// Individual failures behind this error.
    ///
    /// For `DownloadsFailed` this is every collected failure; any other error
    /// is its own single failure.
    pub fn failures(&self) -> Vec<&FetchError> {
        match self {
            Self::DownloadsFailed { failures } => failures.iter().collect(),
            other => vec![other],
        }
    }
}

impl From<Cancelled> for FetchError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

fn summarize(failures: &[FetchError]) -> String {
    let lines: Vec<String> = failures.iter().map(|f| format!("\n  - {}", f)).collect();
    format!("{} failure(s){}", failures.len(), lines.concat())
}
