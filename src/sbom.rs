//! SBOM orchestration: select repositories, clone, scan, save.
//!
//! Each selected repository is handled on its own. A failure (unparsable
//! URL, clone error, generator error) is recorded against that repository
//! and the batch moves on; the caller decides what a partial batch means.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db;
use crate::deadline::bounded;
use crate::git::GitFetcher;
use crate::models::Repo;
use crate::query;
use crate::traits::{RepoFetcher, SbomGenerator};

/// Output file name for a repository: `<org>_<repo>.sbom.json`.
///
/// Takes the first two non-empty path segments of `url`, which URL parsing
/// leaves percent-escaped.
pub fn repo_artifact_name(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).with_context(|| format!("Failed to parse URL {}", url))?;
    let mut segments = parsed
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty());

    match (segments.next(), segments.next()) {
        (Some(org), Some(repo)) => Ok(format!("{}_{}.sbom.json", org, repo)),
        _ => bail!("Invalid repository URL format: {}", url),
    }
}

/// Component label handed to the generator: the URL without its scheme.
pub fn component_label(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// [`SbomGenerator`] that runs `<program> scan <dir> -o <format> --file <tmp>`.
///
/// Defaults to `syft` with `cyclonedx-json@1.5`.
pub struct CommandGenerator {
    program: String,
    format: String,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, format: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SbomGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn generate(
        &self,
        checkout: &Path,
        output: &Path,
        label: &str,
        token: &CancellationToken,
    ) -> Result<()> {
        let program = find_in_path(&self.program)
            .ok_or_else(|| anyhow!("{} is not installed or not in PATH", self.program))?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        // Dropping the temp path removes whatever the generator left behind.
        let tmp = tempfile::Builder::new()
            .prefix(".bomfactory-")
            .suffix(".json.part")
            .tempfile_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?
            .into_temp_path();

        let mut cmd = Command::new(&program);
        cmd.arg("scan")
            .arg(checkout)
            .args(["-o", &self.format])
            .arg("--file")
            .arg(&*tmp)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(label, program = %program.display(), "generating SBOM");
        let what = format!("{} scan for {}", self.program, label);
        let out = bounded(&what, self.timeout, token, async {
            cmd.output()
                .await
                .with_context(|| format!("Failed to execute '{}'", self.program))
        })
        .await?;

        if !out.status.success() {
            bail!(
                "{} exited with {} for {}\nOutput: {}{}",
                self.program,
                out.status,
                label,
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            );
        }

        tmp.persist(output)
            .with_context(|| format!("Failed to save SBOM to {}", output.display()))?;
        Ok(())
    }
}

/// Resolve `program` against `PATH`; paths with a directory part are used as given.
fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

#[derive(Debug, Clone, Default)]
pub struct SbomOptions {
    /// Pause between consecutive repositories.
    pub delay: Duration,
}

/// Outcome of a batch: saved SBOM paths and `(repo_url, error)` pairs.
#[derive(Debug, Default)]
pub struct SbomReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

impl SbomReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Generate an SBOM for each repository into `dir`.
///
/// Per-repository failures land in the report. Only cancellation or an
/// unusable output directory abort the batch.
pub async fn download_sboms(
    repos: &[Repo],
    dir: &Path,
    fetcher: &dyn RepoFetcher,
    generator: &dyn SbomGenerator,
    options: &SbomOptions,
    token: &CancellationToken,
) -> Result<SbomReport> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut report = SbomReport::default();

    for (i, repo) in repos.iter().enumerate() {
        if i > 0 && !options.delay.is_zero() {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(options.delay) => {}
            }
        }
        if token.is_cancelled() {
            bail!("download-sbom cancelled after {} of {} repositories", i, repos.len());
        }

        match sbom_for(repo, dir, fetcher, generator, token).await {
            Ok(path) => {
                info!(url = %repo.repo_url, path = %path.display(), "SBOM saved");
                report.succeeded.push(path);
            }
            Err(e) if token.is_cancelled() => return Err(e),
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(url = %repo.repo_url, error = %reason, "SBOM failed");
                report.failed.push((repo.repo_url.clone(), reason));
            }
        }
    }

    Ok(report)
}

async fn sbom_for(
    repo: &Repo,
    dir: &Path,
    fetcher: &dyn RepoFetcher,
    generator: &dyn SbomGenerator,
    token: &CancellationToken,
) -> Result<PathBuf> {
    let url = repo.repo_url.as_str();
    let output = dir.join(repo_artifact_name(url)?);

    let checkout = tempfile::Builder::new()
        .prefix("repo-clone-")
        .tempdir()
        .with_context(|| format!("Failed to create temporary directory for {}", url))?;

    fetcher
        .fetch(url, checkout.path(), token)
        .await
        .with_context(|| format!("Failed to clone repository {} ({})", url, fetcher.name()))?;

    generator
        .generate(checkout.path(), &output, component_label(url), token)
        .await
        .with_context(|| format!("Failed to generate SBOM for {} ({})", url, generator.name()))?;

    Ok(output)
}

/// CLI entry point for `bomfactory download-sbom`.
pub async fn run_download_sbom(
    config: &Config,
    filters: &[String],
    dir: Option<PathBuf>,
    max_results: u32,
    skip: u32,
    token: &CancellationToken,
) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let repos = query::query_repos(
        &pool,
        filters,
        max_results,
        skip,
        config.query.default_max_results,
        token,
    )
    .await
    .context("Failed to filter repositories")?;
    pool.close().await;

    if repos.is_empty() {
        println!("No repositories matching the criteria");
        return Ok(());
    }

    let dir = dir.unwrap_or_else(|| config.sbom.dir.clone());
    let fetcher = GitFetcher::new(Duration::from_secs(config.sbom.clone_timeout_secs));
    let generator = CommandGenerator::new(
        config.sbom.generator.clone(),
        config.sbom.format.clone(),
        Duration::from_secs(config.sbom.generate_timeout_secs),
    );
    let options = SbomOptions {
        delay: Duration::from_secs(config.sbom.delay_secs),
    };

    let report = download_sboms(&repos, &dir, &fetcher, &generator, &options, token).await?;

    for path in &report.succeeded {
        println!("SBOM saved to {}", path.display());
    }
    for (url, err) in &report.failed {
        eprintln!("Failed: {}: {}", url, err);
    }

    if !report.is_success() {
        bail!(
            "{} of {} SBOM downloads failed",
            report.failed.len(),
            repos.len()
        );
    }
    Ok(())
}
