//! Top-level manifest download orchestration.
//!
//! The orchestrator ties the pieces together: it fetches the manifest,
//! plans one download per resolved artifact, runs those downloads
//! concurrently in a [`TaskGroup`], and reports every failure at once.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{HttpClient, ReqwestClient};
use crate::components::ComponentSpec;
use crate::error::{FetchError, FetchResult};
use crate::fetcher::ManifestFetcher;
use crate::group::TaskGroup;
use crate::guard::ManifestUrlGuard;
use crate::manifest::Manifest;
use crate::resolver;
use crate::retry::RetryingExecutor;

/// Suffix of the temporary file a download is streamed into.
const PARTIAL_SUFFIX: &str = ".part";

/// One artifact scheduled for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub component: String,
    pub package: String,
    pub platform: String,
    /// Canonical URL, already validated.
    pub url: String,
    /// Final location of the artifact.
    pub dest: PathBuf,
}

/// Outcome of a successful [`DownloadOrchestrator::download_components`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Artifacts fetched by this run.
    pub downloaded: Vec<PathBuf>,
    /// Artifacts that were already present, or already scheduled by this
    /// run, and left untouched.
    pub skipped: Vec<PathBuf>,
}

impl DownloadReport {
    /// Total number of artifacts accounted for.
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.skipped.len()
    }
}

/// Downloads manifests and the component artifacts they describe.
pub struct DownloadOrchestrator<C: HttpClient> {
    client: Arc<C>,
    guard: ManifestUrlGuard,
    executor: RetryingExecutor,
    components: ComponentSpec,
}

impl<C: HttpClient> DownloadOrchestrator<C> {
    /// Creates an orchestrator with the default allow-list, backoff schedule
    /// and component table.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            guard: ManifestUrlGuard::default(),
            executor: RetryingExecutor::default(),
            components: ComponentSpec::default(),
        }
    }

    /// Replaces the URL guard.
    pub fn with_guard(mut self, guard: ManifestUrlGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Replaces the retry executor.
    pub fn with_executor(mut self, executor: RetryingExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Replaces the component table.
    pub fn with_components(mut self, components: ComponentSpec) -> Self {
        self.components = components;
        self
    }

    /// Fetches and decodes the manifest at `manifest_url`.
    pub async fn download_manifest(&self, manifest_url: &str) -> FetchResult<Manifest> {
        ManifestFetcher::new(
            Arc::clone(&self.client),
            self.guard.clone(),
            self.executor.clone(),
        )
        .fetch(manifest_url)
        .await
    }

    /// Downloads every artifact the manifest lists for the configured
    /// components on `platforms` into `dest`.
    ///
    /// `platform_packages` maps a platform (e.g. `linux/amd64`) to the
    /// package name suffix manifests use for it (e.g. `linux-x86_64.tar.gz`).
    /// Artifacts already present in `dest` are skipped. All downloads run
    /// concurrently; if any fails, the returned
    /// [`FetchError::DownloadsFailed`] lists every failure.
    pub async fn download_components(
        &self,
        manifest_url: &str,
        platforms: &[String],
        platform_packages: &HashMap<String, String>,
        dest: &Path,
    ) -> FetchResult<DownloadReport> {
        let manifest = self.download_manifest(manifest_url).await?;
        create_dir(dest).await?;

        let mut group = TaskGroup::new();
        let mut report = DownloadReport::default();
        let mut scheduled: HashSet<PathBuf> = HashSet::new();

        for (component, package) in self.components.packages() {
            let Some(project) = manifest.project(component) else {
                debug!(component, "Manifest has no project for component");
                continue;
            };

            for platform in platforms {
                let Some(platform_package) = platform_packages.get(platform) else {
                    warn!(platform = %platform, "No package name known for platform, skipping");
                    continue;
                };

                let Some(urls) =
                    resolver::resolve(project, package, platform_package, &manifest.version)
                else {
                    debug!(package, platform = %platform, "Project does not ship package for platform");
                    continue;
                };

                for raw in urls.artifacts() {
                    let filename = match file_name(raw) {
                        Ok(name) => name,
                        Err(e) => {
                            fail_fast(&group, e);
                            continue;
                        }
                    };

                    let target = dest.join(filename);
                    if scheduled.contains(&target) {
                        debug!(path = %target.display(), "Already scheduled, skipping");
                        report.skipped.push(target);
                        continue;
                    }
                    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                        debug!(path = %target.display(), "Already downloaded, skipping");
                        report.skipped.push(target);
                        continue;
                    }

                    let url = match self.guard.validate(raw) {
                        Ok(url) => url,
                        Err(e @ FetchError::InvalidUrl { .. }) => {
                            fail_fast(&group, e);
                            continue;
                        }
                        Err(e) => {
                            group.record(e);
                            continue;
                        }
                    };

                    let request = DownloadRequest {
                        component: component.to_string(),
                        package: package.to_string(),
                        platform: platform.clone(),
                        url,
                        dest: target,
                    };
                    scheduled.insert(request.dest.clone());
                    report.downloaded.push(request.dest.clone());
                    self.spawn_download(&mut group, request);
                }
            }
        }

        let failures = group.wait().await;
        if !failures.is_empty() {
            return Err(FetchError::DownloadsFailed { failures });
        }

        info!(
            manifest = %manifest_url,
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            "Downloads for manifest complete"
        );
        Ok(report)
    }

    fn spawn_download(&self, group: &mut TaskGroup, request: DownloadRequest) {
        let client = Arc::clone(&self.client);
        let executor = self.executor.clone();
        let token = group.token();

        group.spawn(async move {
            info!(package = %request.package, url = %request.url, "Downloading");
            let partial = partial_path(&request.dest);
            let url = request.url.as_str();
            let client = &*client;
            let tmp = partial.as_path();

            let written = executor
                .execute_cancellable(&token, move || async move { client.download(url, tmp).await })
                .await;

            let bytes = match written {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(match e {
                        FetchError::Cancelled => e,
                        other => FetchError::download(url, other),
                    });
                }
            };

            tokio::fs::rename(&partial, &request.dest)
                .await
                .map_err(|source| FetchError::WriteFailed {
                    path: request.dest.clone(),
                    source,
                })?;

            debug!(
                component = %request.component,
                platform = %request.platform,
                path = %request.dest.display(),
                bytes,
                "Downloaded artifact"
            );
            Ok(())
        });
    }
}

impl DownloadOrchestrator<ReqwestClient> {
    /// Creates an orchestrator backed by a reqwest client with the default
    /// timeout.
    pub fn with_default_client() -> FetchResult<Self> {
        Ok(Self::new(Arc::new(ReqwestClient::new()?)))
    }
}

/// Fetches the manifest at `manifest_url` with production defaults.
pub async fn download_manifest(manifest_url: &str) -> FetchResult<Manifest> {
    DownloadOrchestrator::with_default_client()?
        .download_manifest(manifest_url)
        .await
}

/// Downloads the component artifacts of `manifest_url` with production
/// defaults. See [`DownloadOrchestrator::download_components`].
pub async fn download_components_from_manifest(
    manifest_url: &str,
    platforms: &[String],
    platform_packages: &HashMap<String, String>,
    dest: &Path,
) -> FetchResult<DownloadReport> {
    DownloadOrchestrator::with_default_client()?
        .download_components(manifest_url, platforms, platform_packages, dest)
        .await
}

/// Records a failure that must stop every other download.
fn fail_fast(group: &TaskGroup, error: FetchError) {
    warn!(error = %error, "Cancelling downloads");
    group.record(error);
    group.cancel();
}

/// Final path segment of `url`, ignoring any query string or fragment.
fn file_name(url: &str) -> FetchResult<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end]
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "no file name in path".to_string(),
        })
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn create_dir(path: &Path) -> FetchResult<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);

    builder
        .create(path)
        .await
        .map_err(|source| FetchError::DirectoryCreateFailed {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::MockHttpClient;
    use crate::guard::AllowedHosts;
    use crate::retry::tests::recording_executor;

    const MANIFEST_URL: &str = "https://snapshots.elastic.co/8.9.0-abc/manifest-8.9.0.json";
    const BASE: &str = "https://snapshots.elastic.co/8.9.0-abc/downloads/beats";

    fn artifact(name: &str) -> String {
        format!("{}/{}", BASE, name)
    }

    /// Manifest with one `beats` package per entry of `packages`.
    fn manifest_body(packages: &[(&str, [&str; 3])]) -> String {
        let entries: Vec<String> = packages
            .iter()
            .map(|(key, [url, sha, asc])| {
                format!(
                    r#""{}": {{"url": "{}", "sha_url": "{}", "asc_url": "{}"}}"#,
                    key, url, sha, asc
                )
            })
            .collect();
        format!(
            r#"{{"version": "8.9.0", "build_id": "8.9.0-abc", "manifest_version": "2.0.0",
                "projects": {{"beats": {{"branch": "main", "commit_hash": "abc", "packages": {{{}}}}}}}}}"#,
            entries.join(",")
        )
    }

    fn linux() -> (Vec<String>, HashMap<String, String>) {
        let platforms = vec!["linux/amd64".to_string()];
        let packages = HashMap::from([(
            "linux/amd64".to_string(),
            "linux-x86_64.tar.gz".to_string(),
        )]);
        (platforms, packages)
    }

    fn orchestrator(client: MockHttpClient) -> (DownloadOrchestrator<MockHttpClient>, Arc<MockHttpClient>) {
        let client = Arc::new(client);
        let (executor, _) = recording_executor(&[1, 1, 1]);
        let orchestrator = DownloadOrchestrator::new(client.clone())
            .with_executor(executor)
            .with_components(ComponentSpec::new([(
                "beats",
                vec!["filebeat", "metricbeat", "auditbeat"],
            )]));
        (orchestrator, client)
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("https://h/a/b.tar.gz").unwrap(), "b.tar.gz");
        assert_eq!(file_name("https://h/a/b.tar.gz?x=1#y").unwrap(), "b.tar.gz");
        assert_eq!(file_name("https://h/a/dir/").unwrap(), "dir");
        assert!(file_name("").is_err());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/a.tar.gz")),
            PathBuf::from("/tmp/a.tar.gz.part")
        );
    }

    #[tokio::test]
    async fn test_downloads_every_resolved_artifact() {
        let url = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let sha = format!("{}.sha512", url);
        let asc = format!("{}.asc", url);
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [url.as_str(), sha.as_str(), asc.as_str()])]);

        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&url, "tarball")
                .with_body(&sha, "sha")
                .with_body(&asc, "asc"),
        );
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("drop");
        let (platforms, packages) = linux();

        let report = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, &dest)
            .await
            .unwrap();

        assert_eq!(report.downloaded.len(), 3);
        assert!(report.skipped.is_empty());
        assert_eq!(
            std::fs::read(dest.join("filebeat-8.9.0-linux-x86_64.tar.gz")).unwrap(),
            b"tarball"
        );
        assert!(dest.join("filebeat-8.9.0-linux-x86_64.tar.gz.sha512").exists());
        assert!(dest.join("filebeat-8.9.0-linux-x86_64.tar.gz.asc").exists());
        assert!(!dest.join("filebeat-8.9.0-linux-x86_64.tar.gz.part").exists());
        assert_eq!(client.total_requests(), 4);
    }

    #[tokio::test]
    async fn test_second_run_downloads_nothing() {
        let url = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [url.as_str(), "", ""])]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&url, "tarball"),
        );
        let dir = tempfile::tempdir().unwrap();
        let (platforms, packages) = linux();

        let first = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap();
        assert_eq!(first.downloaded.len(), 1);
        assert_eq!(client.request_count(&url), 1);

        let second = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap();
        assert!(second.downloaded.is_empty());
        assert_eq!(second.skipped.len(), 1);
        assert_eq!(client.request_count(&url), 1);
    }

    #[tokio::test]
    async fn test_failures_are_aggregated() {
        let ok_a = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let ok_b = artifact("metricbeat-8.9.0-linux-x86_64.tar.gz");
        let bad = artifact("auditbeat-8.9.0-linux-x86_64.tar.gz");
        let body = manifest_body(&[
            ("filebeat-8.9.0-linux-x86_64.tar.gz", [ok_a.as_str(), "", ""]),
            ("metricbeat-8.9.0-linux-x86_64.tar.gz", [ok_b.as_str(), "", ""]),
            ("auditbeat-8.9.0-linux-x86_64.tar.gz", [bad.as_str(), "", ""]),
        ]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&ok_a, "a")
                .with_body(&ok_b, "b")
                .with_failure(&bad),
        );
        let dir = tempfile::tempdir().unwrap();
        let (platforms, packages) = linux();

        let err = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], FetchError::DownloadFailed { url, .. } if *url == bad));
        assert!(dir.path().join("filebeat-8.9.0-linux-x86_64.tar.gz").exists());
        assert!(dir.path().join("metricbeat-8.9.0-linux-x86_64.tar.gz").exists());
        assert!(!dir.path().join("auditbeat-8.9.0-linux-x86_64.tar.gz").exists());
        assert!(!dir.path().join("auditbeat-8.9.0-linux-x86_64.tar.gz.part").exists());
        assert_eq!(client.request_count(&bad), 4);
    }

    #[tokio::test]
    async fn test_disallowed_artifact_host_is_reported() {
        let evil = "https://artifacts.example.com/filebeat-8.9.0-linux-x86_64.tar.gz";
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [evil, "", ""])]);
        let (orchestrator, client) = orchestrator(MockHttpClient::new().with_body(MANIFEST_URL, body));
        let dir = tempfile::tempdir().unwrap();
        let (platforms, packages) = linux();

        let err = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(
            err.failures().as_slice(),
            [FetchError::HostNotAllowed { host, .. }] if host == "artifacts.example.com"
        ));
        assert_eq!(client.request_count(evil), 0);
        assert_eq!(client.total_requests(), 1);
    }

    #[tokio::test]
    async fn test_invalid_artifact_url_cancels_downloads() {
        let good = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let body = manifest_body(&[
            ("auditbeat-8.9.0-linux-x86_64.tar.gz", ["::not a url/auditbeat.tar.gz", "", ""]),
            ("filebeat-8.9.0-linux-x86_64.tar.gz", [good.as_str(), "", ""]),
        ]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&good, "ok"),
        );
        let orchestrator =
            orchestrator.with_components(ComponentSpec::new([("beats", vec!["auditbeat", "filebeat"])]));
        let dir = tempfile::tempdir().unwrap();
        let (platforms, packages) = linux();

        let err = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap_err();

        let failures = err.failures();
        assert!(failures.iter().any(|f| matches!(f, FetchError::InvalidUrl { .. })));
        // filebeat is scheduled after the invalid auditbeat URL was seen.
        assert!(failures.iter().any(|f| matches!(f, FetchError::Cancelled)));
        assert_eq!(client.request_count(&good), 0);
    }

    #[tokio::test]
    async fn test_manifest_failure_aborts() {
        let (orchestrator, client) = orchestrator(MockHttpClient::new().with_failure(MANIFEST_URL));
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("never-created");
        let (platforms, packages) = linux();

        let err = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::ManifestFetchFailed { .. }));
        assert!(!dest.exists());
        assert_eq!(client.total_requests(), 4);
    }

    #[tokio::test]
    async fn test_directory_create_failure() {
        let url = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [url.as_str(), "", ""])]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&url, "x"),
        );
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let (platforms, packages) = linux();

        let err = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, &blocker.join("drop"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::DirectoryCreateFailed { .. }));
        assert_eq!(client.request_count(&url), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_platform_downloads_once() {
        let url = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [url.as_str(), "", ""])]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&url, "tarball"),
        );
        let dir = tempfile::tempdir().unwrap();
        let (_, packages) = linux();
        let platforms = vec!["linux/amd64".to_string(), "linux/amd64".to_string()];

        let report = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap();

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(client.request_count(&url), 1);
        assert_eq!(
            std::fs::read(dir.path().join("filebeat-8.9.0-linux-x86_64.tar.gz")).unwrap(),
            b"tarball"
        );
    }

    #[tokio::test]
    async fn test_platforms_sharing_a_package_name_download_once() {
        let url = artifact("filebeat-8.9.0-linux-x86_64.tar.gz");
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [url.as_str(), "", ""])]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(MANIFEST_URL, body)
                .with_body(&url, "tarball"),
        );
        let dir = tempfile::tempdir().unwrap();
        let platforms = vec!["linux/amd64".to_string(), "linux/x86_64".to_string()];
        let packages = HashMap::from([
            ("linux/amd64".to_string(), "linux-x86_64.tar.gz".to_string()),
            ("linux/x86_64".to_string(), "linux-x86_64.tar.gz".to_string()),
        ]);

        let report = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap();

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(client.request_count(&url), 1);
    }

    #[tokio::test]
    async fn test_custom_guard_applies_to_manifest_and_artifacts() {
        let manifest_url = "https://mirror.internal/manifest.json";
        let url = "https://mirror.internal/filebeat-8.9.0-linux-x86_64.tar.gz";
        let body = manifest_body(&[("filebeat-8.9.0-linux-x86_64.tar.gz", [url, "", ""])]);
        let (orchestrator, client) = orchestrator(
            MockHttpClient::new()
                .with_body(manifest_url, body)
                .with_body(url, "mirrored"),
        );
        let orchestrator =
            orchestrator.with_guard(ManifestUrlGuard::new(AllowedHosts::new(["mirror.internal"])));
        let dir = tempfile::tempdir().unwrap();
        let (platforms, packages) = linux();

        let report = orchestrator
            .download_components(manifest_url, &platforms, &packages, dir.path())
            .await
            .unwrap();

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(client.request_count(url), 1);
        assert!(orchestrator.download_manifest(MANIFEST_URL).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_platform_and_project_are_skipped() {
        let body = manifest_body(&[]);
        let (orchestrator, client) = orchestrator(MockHttpClient::new().with_body(MANIFEST_URL, body));
        let orchestrator = orchestrator.with_components(ComponentSpec::new([
            ("beats", vec!["filebeat"]),
            ("fleet-server", vec!["fleet-server"]),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let platforms = vec!["linux/amd64".to_string(), "plan9/mips".to_string()];
        let (_, packages) = linux();

        let report = orchestrator
            .download_components(MANIFEST_URL, &platforms, &packages, dir.path())
            .await
            .unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(client.total_requests(), 1);
    }
}
