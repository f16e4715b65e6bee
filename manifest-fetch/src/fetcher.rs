//! Manifest download and decoding.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::HttpClient;
use crate::error::{FetchError, FetchResult};
use crate::guard::ManifestUrlGuard;
use crate::manifest::Manifest;
use crate::retry::RetryingExecutor;

/// Downloads and decodes build manifests.
pub struct ManifestFetcher<C: HttpClient> {
    client: Arc<C>,
    guard: ManifestUrlGuard,
    executor: RetryingExecutor,
}

impl<C: HttpClient> ManifestFetcher<C> {
    /// Creates a fetcher.
    ///
    /// # Arguments
    ///
    /// * `client` - Network client used for the GET request
    /// * `guard` - Allow-list the manifest URL must satisfy
    /// * `executor` - Retry policy for the fetch
    pub fn new(client: Arc<C>, guard: ManifestUrlGuard, executor: RetryingExecutor) -> Self {
        Self {
            client,
            guard,
            executor,
        }
    }

    /// Fetches the manifest at `manifest_url`.
    ///
    /// The URL is validated and canonicalized first; validation failures are
    /// not retried. Each attempt performs the GET and decodes the body, so a
    /// body that fails to decode is retried like a network failure. Every
    /// failure is reported as [`FetchError::ManifestFetchFailed`].
    pub async fn fetch(&self, manifest_url: &str) -> FetchResult<Manifest> {
        let canonical = self
            .guard
            .validate(manifest_url)
            .map_err(|e| FetchError::manifest(manifest_url, e))?;

        let client = &*self.client;
        let url = canonical.as_str();
        let manifest = self
            .executor
            .execute(move || async move {
                let body = client.get(url).await?;
                Manifest::from_slice(&body).map_err(|e| FetchError::ManifestDecode {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            })
            .await
            .map_err(|e| FetchError::manifest(manifest_url, e))?;

        info!(manifest = %manifest_url, "Downloaded manifest");
        debug!(
            version = %manifest.version,
            build_id = %manifest.build_id,
            manifest_version = %manifest.manifest_version,
            "Manifest details"
        );

        Ok(manifest)
    }
}
