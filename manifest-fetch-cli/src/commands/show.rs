//! Show command - print a summary of a manifest.

use manifest_fetch::{DownloadOrchestrator, Manifest, ReqwestClient};

use crate::error::CliError;

/// Run the show command.
pub async fn run(
    orchestrator: &DownloadOrchestrator<ReqwestClient>,
    manifest_url: &str,
) -> Result<(), CliError> {
    let manifest = orchestrator.download_manifest(manifest_url).await?;
    print!("{}", summarize(&manifest));
    Ok(())
}

fn summarize(manifest: &Manifest) -> String {
    let mut out = String::new();
    out.push_str(&format!("Version:          {}\n", manifest.version));
    out.push_str(&format!("Build ID:         {}\n", manifest.build_id));
    out.push_str(&format!("Manifest version: {}\n", manifest.manifest_version));
    out.push_str(&format!("Projects:         {}\n", manifest.projects.len()));

    for (name, project) in &manifest.projects {
        out.push_str(&format!(
            "  {:<24} {} @ {} ({} packages)\n",
            name,
            project.branch,
            short_commit(&project.commit_hash),
            project.packages.len()
        ));
    }
    out
}

fn short_commit(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
