//! Shallow git checkouts for SBOM generation.
//!
//! Shells out to the system `git` binary, so credentials and proxies follow
//! the user's git configuration.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::deadline::bounded;
use crate::traits::RepoFetcher;

/// [`RepoFetcher`] backed by `git clone --depth 1 --single-branch`.
pub struct GitFetcher {
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    fn name(&self) -> &str {
        "git"
    }

    async fn fetch(&self, url: &str, dest: &Path, token: &CancellationToken) -> Result<()> {
        let what = format!("git clone {}", url);
        bounded(&what, self.timeout, token, git_clone(url, dest)).await
    }
}

async fn git_clone(url: &str, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create clone directory: {}", dest.display()))?;

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth", "1", "--single-branch"]);
    cmd.arg(url);
    cmd.arg(dest);
    cmd.env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    debug!(url, dest = %dest.display(), "cloning");
    let output = cmd
        .output()
        .await
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clone_of_missing_repo_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("no-such-repo");
        let fetcher = GitFetcher::new(Duration::from_secs(30));
        let token = CancellationToken::new();

        let result = fetcher
            .fetch(
                missing.to_str().unwrap(),
                &tmp.path().join("checkout"),
                &token,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clone_respects_cancellation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fetcher = GitFetcher::new(Duration::from_secs(30));
        let token = CancellationToken::new();
        token.cancel();

        let err = fetcher
            .fetch("https://github.com/ossf/criticality_score", tmp.path(), &token)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
