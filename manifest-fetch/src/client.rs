//! HTTP client abstraction for testability.

use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::AsyncWriteExt;

use crate::error::{FetchError, FetchResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Trait for the network operations this crate performs.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling in-memory clients in tests. URLs passed in have already been
/// validated by the guard.
pub trait HttpClient: Send + Sync + 'static {
    /// Performs an HTTP GET request and returns the whole body.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchResult<Vec<u8>>>;

    /// Performs an HTTP GET request, streaming the body into `dest`.
    ///
    /// Returns the number of bytes written.
    fn download<'a>(&'a self, url: &'a str, dest: &'a Path) -> BoxFuture<'a, FetchResult<u64>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default timeout.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new ReqwestClient with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("manifest-fetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> FetchResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        Ok(response)
    }

    async fn get_body(&self, url: &str) -> FetchResult<Vec<u8>> {
        let response = self.send(url).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| transport(url, e))
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> FetchResult<u64> {
        let mut response = self.send(url).await?;

        let write_failed = |source: std::io::Error| FetchError::WriteFailed {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(write_failed)?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| transport(url, e))? {
            file.write_all(&chunk).await.map_err(write_failed)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(write_failed)?;
        Ok(written)
    }
}

fn transport(url: &str, err: reqwest::Error) -> FetchError {
    let reason = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        err.to_string()
    };
    FetchError::Transport {
        url: url.to_string(),
        reason,
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchResult<Vec<u8>>> {
        Box::pin(self.get_body(url))
    }

    fn download<'a>(&'a self, url: &'a str, dest: &'a Path) -> BoxFuture<'a, FetchResult<u64>> {
        Box::pin(self.stream_to_file(url, dest))
    }
}
