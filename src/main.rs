//! # bomfactory CLI
//!
//! Loads OpenSSF criticality-score exports into SQLite, selects repositories
//! with filter criteria, and generates SBOMs for the selection.
//!
//! ## Usage
//!
//! ```bash
//! bomfactory --config ./bomfactory.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bomfactory init` | Create the repos table |
//! | `bomfactory load --csv <file>` | Load a CSV export (optionally a row window) |
//! | `bomfactory download-csv` | Fetch the criticality-score CSV |
//! | `bomfactory query --filter f:op:v` | Select repositories |
//! | `bomfactory download-sbom --filter f:op:v` | Clone and generate SBOMs for a selection |
//! | `bomfactory convert-to-purl --file <f>` | Add package URLs to SPDX documents |
//! | `bomfactory validate-sbom --dir <d>` | Check SBOM documents |
//!
//! ## Examples
//!
//! ```bash
//! # Load rows 0..5000 of the export
//! bomfactory load --csv data.csv --end 5000
//!
//! # Popular Go repositories, skipping the first ten
//! bomfactory query --filter repo_language:=:Go --filter repo_star_count:>:1000 --skip 10
//!
//! # Several languages at once
//! bomfactory query --filter "repo_language:IN:Go,Rust" --json
//! ```

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use bomfactory::config::{self, Config};
use bomfactory::ingest::OnConflict;
use bomfactory::progress::ProgressMode;
use bomfactory::{db, download, ingest, migrate, purl, query, sbom, validate};

const DEFAULT_CONFIG: &str = "./bomfactory.toml";

/// bomfactory: criticality-score ingestion, repository selection, and SBOM
/// generation.
///
/// Settings are read from a TOML file. Without `--config`, `./bomfactory.toml`
/// is used when present and built-in defaults otherwise.
#[derive(Parser)]
#[command(
    name = "bomfactory",
    about = "Load criticality-score data, select repositories, and generate SBOMs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr. `RUST_LOG` overrides this.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the repos table. Safe to run repeatedly.
    Init {
        /// SQLite database path (overrides `[db] path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Load a criticality-score CSV file into the database.
    ///
    /// The header must only name known columns and must include `repo.url`.
    /// Rows whose `repo.url` is already stored follow `[load] on_conflict`.
    Load {
        /// CSV file to load.
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        db: Option<PathBuf>,

        /// First data row to load (0-based, inclusive).
        #[arg(long, default_value_t = 0)]
        start: u64,

        /// Row to stop before (0-based, exclusive). Omit to load to the end.
        #[arg(long)]
        end: Option<u64>,

        /// Policy for rows whose `repo.url` is already stored (overrides
        /// `[load] on_conflict`).
        #[arg(long, value_enum)]
        on_conflict: Option<OnConflict>,

        /// Progress reporting on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Download the criticality-score CSV export.
    DownloadCsv {
        /// Source URL (overrides `[download] csv_url`).
        #[arg(long)]
        url: Option<String>,

        /// Destination file (overrides `[download] output`).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Select repositories matching every filter, best score first.
    Query {
        /// Filter as `field:operator:value`, e.g. `repo_star_count:>:100`.
        /// Repeatable; filters are combined with AND.
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Maximum rows to return; 0 uses `[query] default_max_results`.
        #[arg(long, default_value_t = 0)]
        max_results: u32,

        /// Rows to skip before returning results.
        #[arg(long, default_value_t = 0)]
        skip: u32,

        /// Print every matched record as JSON.
        #[arg(long)]
        json: bool,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Clone each selected repository and generate an SBOM for it.
    DownloadSbom {
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Output directory (overrides `[sbom] dir`).
        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long, default_value_t = 0)]
        max_results: u32,

        #[arg(long, default_value_t = 0)]
        skip: u32,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Add package-URL references to SPDX JSON documents in place.
    #[command(group(ArgGroup::new("target").required(true).args(["file", "dir"])))]
    ConvertToPurl {
        #[arg(long)]
        file: Option<PathBuf>,

        /// Process every top-level `*.json` file in this directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Validate SPDX or CycloneDX JSON documents.
    #[command(group(ArgGroup::new("target").required(true).args(["file", "dir"])))]
    ValidateSbom {
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("bomfactory=debug")
        } else {
            EnvFilter::new("bomfactory=warn")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => config::load_config_or_default(Path::new(DEFAULT_CONFIG)),
    }
}

fn override_db(cfg: &mut Config, db: Option<PathBuf>) {
    if let Some(path) = db {
        cfg.db.path = path;
    }
}

/// Root token cancelled on Ctrl-C; every long-running step watches it.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            child.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // File-only commands do not need the config.
    match &cli.command {
        Commands::ConvertToPurl { file, dir } => {
            return purl::run_convert(file.clone(), dir.clone());
        }
        Commands::ValidateSbom { file, dir } => {
            return validate::run_validate(file.clone(), dir.clone());
        }
        _ => {}
    }

    let mut cfg = load_settings(cli.config.as_deref())?;
    let token = shutdown_token();

    match cli.command {
        Commands::Init { db } => {
            override_db(&mut cfg, db);
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Load {
            csv,
            db,
            start,
            end,
            on_conflict,
            progress,
        } => {
            override_db(&mut cfg, db);
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_load(&cfg, &csv, start, end, on_conflict, progress, &token).await?;
        }
        Commands::DownloadCsv { url, output } => {
            download::run_download_csv(&cfg, url, output, &token).await?;
        }
        Commands::Query {
            filters,
            max_results,
            skip,
            json,
            db,
        } => {
            override_db(&mut cfg, db);
            query::run_query(&cfg, &filters, max_results, skip, json, &token).await?;
        }
        Commands::DownloadSbom {
            filters,
            dir,
            max_results,
            skip,
            db,
        } => {
            override_db(&mut cfg, db);
            sbom::run_download_sbom(&cfg, &filters, dir, max_results, skip, &token).await?;
        }
        Commands::ConvertToPurl { .. } | Commands::ValidateSbom { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
