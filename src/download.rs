//! Fetch the criticality-score CSV export.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::deadline::bounded;

/// Download `url` to `output`.
///
/// The body is streamed into `<output>.part` and renamed into place once
/// complete; on error, timeout or cancellation the partial file is removed.
pub async fn download_csv(
    url: &str,
    output: &Path,
    timeout: Duration,
    token: &CancellationToken,
) -> Result<u64> {
    let partial = part_path(output);
    let result = bounded("download", timeout, token, fetch_to(url, &partial)).await;

    match result {
        Ok(bytes) => {
            tokio::fs::rename(&partial, output)
                .await
                .with_context(|| format!("Failed to move download into {}", output.display()))?;
            info!(url, bytes, output = %output.display(), "download complete");
            Ok(bytes)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn fetch_to(url: &str, dest: &Path) -> Result<u64> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to request {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!("GET {} returned HTTP {}", url, status);
    }

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("Failed while reading body of {}", url))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// CLI entry point for `bomfactory download-csv`.
pub async fn run_download_csv(
    config: &Config,
    url: Option<String>,
    output: Option<PathBuf>,
    token: &CancellationToken,
) -> Result<()> {
    let url = url.unwrap_or_else(|| config.download.csv_url.clone());
    let output = output.unwrap_or_else(|| config.download.output.clone());
    let timeout = Duration::from_secs(config.download.timeout_secs);

    download_csv(&url, &output, timeout, token)
        .await
        .context("Failed to download CSV file")?;

    println!("CSV file downloaded successfully to {}", output.display());
    Ok(())
}
