use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::{LoadOptions, OnConflict};

pub const DEFAULT_CSV_URL: &str = "https://www.googleapis.com/download/storage/v1/b/ossf-criticality-score/o/2024.07.05%2F143335%2Fall.csv?generation=1721362287412491&alt=media";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub sbom: SbomConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadConfig {
    #[serde(default)]
    pub on_conflict: OnConflict,
    #[serde(default)]
    pub atomic: bool,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            on_conflict: OnConflict::default(),
            atomic: false,
            progress_every: default_progress_every(),
        }
    }
}

fn default_progress_every() -> u64 {
    1000
}

impl LoadConfig {
    /// Load options for a `[start, start + max)` window.
    pub fn options(&self, start_line: u64, max_records: u64) -> LoadOptions {
        LoadOptions {
            start_line,
            max_records,
            on_conflict: self.on_conflict,
            atomic: self.atomic,
            progress_every: self.progress_every,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    #[serde(default = "default_csv_url")]
    pub csv_url: String,
    #[serde(default = "default_csv_output")]
    pub output: PathBuf,
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            csv_url: default_csv_url(),
            output: default_csv_output(),
            timeout_secs: default_download_timeout(),
        }
    }
}

fn default_csv_url() -> String {
    DEFAULT_CSV_URL.to_string()
}
fn default_csv_output() -> PathBuf {
    PathBuf::from("data.csv")
}
fn default_download_timeout() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct SbomConfig {
    #[serde(default = "default_sbom_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_secs: u64,
    #[serde(default = "default_delay")]
    pub delay_secs: u64,
}

impl Default for SbomConfig {
    fn default() -> Self {
        Self {
            dir: default_sbom_dir(),
            generator: default_generator(),
            format: default_format(),
            generate_timeout_secs: default_generate_timeout(),
            clone_timeout_secs: default_clone_timeout(),
            delay_secs: default_delay(),
        }
    }
}

fn default_sbom_dir() -> PathBuf {
    PathBuf::from("sbom")
}
fn default_generator() -> String {
    "syft".to_string()
}
fn default_format() -> String {
    "cyclonedx-json@1.5".to_string()
}
fn default_generate_timeout() -> u64 {
    120
}
fn default_clone_timeout() -> u64 {
    300
}
fn default_delay() -> u64 {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Read `path` if it exists, otherwise fall back to built-in defaults.
///
/// Used for the implicit default config path; an explicitly requested file
/// must exist and goes through [`load_config`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.query.default_max_results < 1 {
        anyhow::bail!("query.default_max_results must be >= 1");
    }

    if config.load.progress_every < 1 {
        anyhow::bail!("load.progress_every must be >= 1");
    }

    if config.download.timeout_secs < 1 {
        anyhow::bail!("download.timeout_secs must be >= 1");
    }

    if config.sbom.generate_timeout_secs < 1 || config.sbom.clone_timeout_secs < 1 {
        anyhow::bail!("sbom.generate_timeout_secs and sbom.clone_timeout_secs must be >= 1");
    }

    if config.sbom.generator.trim().is_empty() {
        anyhow::bail!("sbom.generator must name an executable");
    }

    Ok(())
}
