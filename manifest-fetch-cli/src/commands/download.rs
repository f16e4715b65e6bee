//! Download command - fetch every component artifact listed in a manifest.

use std::future::Future;
use std::path::PathBuf;

use manifest_fetch::config::ConfigFile;
use manifest_fetch::{DownloadOrchestrator, DownloadReport, ReqwestClient};
use tracing::info;

use super::common::select_platforms;
use crate::error::CliError;

/// Arguments for the download command.
pub struct DownloadArgs {
    pub manifest_url: String,
    pub dest: PathBuf,
    pub platforms: Vec<String>,
}

/// Run the download command.
///
/// Ctrl-C drops the in-flight downloads; partial files are left with a
/// `.part` suffix and do not block the next run.
pub async fn run(
    orchestrator: &DownloadOrchestrator<ReqwestClient>,
    config: &ConfigFile,
    args: DownloadArgs,
) -> Result<(), CliError> {
    let platforms = select_platforms(config, &args.platforms)?;
    let platform_packages = config.platform_packages();

    info!(
        manifest = %args.manifest_url,
        dest = %args.dest.display(),
        platforms = ?platforms,
        "Starting downloads"
    );

    let downloads = orchestrator.download_components(
        &args.manifest_url,
        &platforms,
        &platform_packages,
        &args.dest,
    );
    let report = until_interrupted(downloads, tokio::signal::ctrl_c()).await??;

    print!("{}", summarize(&report, &args.dest));
    Ok(())
}

/// Runs `work` to completion unless `signal` reports an interrupt first.
///
/// A signal future that fails (e.g. no handler could be installed) is
/// ignored and `work` keeps running.
async fn until_interrupted<T, W, S>(work: W, signal: S) -> Result<T, CliError>
where
    W: Future<Output = T>,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        value = work => Ok(value),
        Ok(()) = signal => Err(CliError::Interrupted),
    }
}

fn summarize(report: &DownloadReport, dest: &std::path::Path) -> String {
    let mut out = format!(
        "Downloaded {} artifact(s), {} already present, into {}\n",
        report.downloaded.len(),
        report.skipped.len(),
        dest.display()
    );
    for path in &report.downloaded {
        if let Some(name) = path.file_name() {
            out.push_str(&format!("  + {}\n", name.to_string_lossy()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interrupt_stops_work() {
        let result = until_interrupted(std::future::pending::<()>(), async { Ok(()) }).await;
        assert!(matches!(result, Err(CliError::Interrupted)));
    }

    #[tokio::test]
    async fn test_failed_signal_handler_does_not_interrupt() {
        let work = async {
            tokio::task::yield_now().await;
            7
        };
        let signal = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no handler")) };

        assert_eq!(until_interrupted(work, signal).await.unwrap(), 7);
    }

    #[test]
    fn test_summarize_lists_downloaded_files() {
        let report = DownloadReport {
            downloaded: vec![PathBuf::from("/drop/filebeat-8.9.0-linux-x86_64.tar.gz")],
            skipped: vec![PathBuf::from("/drop/auditbeat-8.9.0-linux-x86_64.tar.gz")],
        };
        let text = summarize(&report, std::path::Path::new("/drop"));
        assert!(text.starts_with("Downloaded 1 artifact(s), 1 already present, into /drop"));
        assert!(text.contains("  + filebeat-8.9.0-linux-x86_64.tar.gz"));
        assert!(!text.contains("auditbeat"));
    }
}
