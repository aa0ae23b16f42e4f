//! Record loader: criticality-score CSV rows into the repos table.
//!
//! The header is validated against the schema registry before anything is
//! written. Rows are then streamed, coerced by column type, and inserted with
//! bound parameters. Without `atomic`, each row commits on its own and a
//! failing row leaves earlier rows in place; with `atomic`, the whole load is
//! one transaction.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::{parse_integer, StoreValue};
use crate::progress::{LoadProgressEvent, LoadProgressReporter, ProgressMode};
use crate::schema::{self, Column, ColumnType, IDENTITY, TABLE};

/// What to do when a row's identity is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Overwrite the stored row's columns that appear in the header.
    #[default]
    Upsert,
    /// Keep the stored row and move on.
    Skip,
    /// Abort the load with a store error.
    Fail,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Data rows to skip before inserting (0-based, header excluded).
    pub start_line: u64,
    /// Maximum rows to insert; 0 means no limit.
    pub max_records: u64,
    pub on_conflict: OnConflict,
    /// Wrap the load in a single transaction.
    pub atomic: bool,
    /// Emit a progress event every this many rows.
    pub progress_every: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            start_line: 0,
            max_records: 0,
            on_conflict: OnConflict::Upsert,
            atomic: false,
            progress_every: 1000,
        }
    }
}

/// Counts from a completed load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rows skipped because of `start_line`.
    pub skipped: u64,
    /// Rows inserted or updated.
    pub written: u64,
    /// Rows left untouched because their identity already existed.
    pub conflicts: u64,
}

/// Coerce one CSV field by its column type.
///
/// Empty fields become `0`, `0.0`, or `NULL`. Reals in integer columns are
/// truncated toward zero. A non-empty numeric field that does not parse is
/// passed through as text and left to SQLite's affinity.
pub fn coerce_field(column: &Column, raw: &str) -> StoreValue {
    if raw.is_empty() {
        return match column.ty {
            ColumnType::Integer => StoreValue::Integer(0),
            ColumnType::Real => StoreValue::Real(0.0),
            ColumnType::Text => StoreValue::Null,
        };
    }

    let parsed = match column.ty {
        ColumnType::Integer => parse_integer(raw).map(StoreValue::Integer),
        ColumnType::Real => raw.trim().parse::<f64>().ok().map(StoreValue::Real),
        ColumnType::Text => return StoreValue::Text(raw.to_string()),
    };

    parsed.unwrap_or_else(|| {
        warn!(
            column = column.internal,
            value = raw,
            "numeric column holds a non-numeric value; storing as text"
        );
        StoreValue::Text(raw.to_string())
    })
}

/// Build the insert statement for a validated header.
pub fn insert_sql(columns: &[&Column], on_conflict: OnConflict) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.internal).collect();
    let placeholders = vec!["?"; names.len()].join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        TABLE,
        names.join(", "),
        placeholders
    );

    let updates: Vec<String> = names
        .iter()
        .filter(|name| **name != IDENTITY)
        .map(|name| format!("{name} = excluded.{name}"))
        .collect();

    match on_conflict {
        OnConflict::Upsert if !updates.is_empty() => {
            sql.push_str(&format!(
                " ON CONFLICT({}) DO UPDATE SET {}",
                IDENTITY,
                updates.join(", ")
            ));
        }
        OnConflict::Upsert | OnConflict::Skip => {
            sql.push_str(&format!(" ON CONFLICT({}) DO NOTHING", IDENTITY));
        }
        OnConflict::Fail => {}
    }

    sql
}

/// Open a CSV file and validate its header against the schema registry.
///
/// Returns the reader positioned at the first data row and the header's
/// columns in file order.
pub fn open_csv(path: &Path) -> Result<(csv::Reader<File>, Vec<&'static Column>)> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let header = reader
        .headers()
        .map_err(|source| Error::Csv {
            path: path.to_path_buf(),
            what: "header".to_string(),
            source,
        })?
        .clone();
    let columns = schema::translate_header(header.iter())?;
    debug!(path = %path.display(), columns = columns.len(), "header validated");

    Ok((reader, columns))
}

/// Load a CSV file into the repos table.
pub async fn load_csv(
    path: &Path,
    pool: &SqlitePool,
    options: &LoadOptions,
    progress: &dyn LoadProgressReporter,
    token: &CancellationToken,
) -> Result<LoadSummary> {
    let (mut reader, columns) = open_csv(path)?;

    let mut summary = LoadSummary::default();
    let mut record = csv::StringRecord::new();

    while summary.skipped < options.start_line {
        let more = reader
            .read_record(&mut record)
            .map_err(|source| Error::Csv {
                path: path.to_path_buf(),
                what: format!("row {} while skipping", summary.skipped),
                source,
            })?;
        if !more {
            debug!(skipped = summary.skipped, "reached end of input while skipping");
            return Ok(summary);
        }
        summary.skipped += 1;
    }

    let sql = insert_sql(&columns, options.on_conflict);
    let load = RowLoader {
        path: path.to_path_buf(),
        columns,
        sql,
        options,
        progress,
        token,
    };

    let source = path.display().to_string();
    progress.report(LoadProgressEvent::Started {
        source: source.clone(),
    });

    if options.atomic {
        let mut tx = pool
            .begin()
            .await
            .map_err(Error::store("failed to begin load transaction"))?;
        match load.run(&mut *tx, &mut reader, &mut summary).await {
            Ok(()) => tx
                .commit()
                .await
                .map_err(Error::store("failed to commit load transaction"))?,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback after failed load also failed");
                }
                return Err(e);
            }
        }
    } else {
        let mut conn = pool
            .acquire()
            .await
            .map_err(Error::store("failed to acquire connection"))?;
        load.run(&mut *conn, &mut reader, &mut summary).await?;
    }

    progress.report(LoadProgressEvent::Finished {
        source,
        n: summary.written,
    });
    info!(
        path = %path.display(),
        written = summary.written,
        conflicts = summary.conflicts,
        skipped = summary.skipped,
        "load complete"
    );

    Ok(summary)
}

/// CLI entry point for `bomfactory load`.
///
/// `end` is an exclusive 0-based row index; rows `[start, end)` are loaded.
/// The table is created first if it does not exist.
pub async fn run_load(
    config: &Config,
    csv_path: &Path,
    start: u64,
    end: Option<u64>,
    on_conflict: Option<OnConflict>,
    progress: ProgressMode,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let max_records = match end {
        Some(end) if end < start => {
            anyhow::bail!("--end ({}) must not be less than --start ({})", end, start)
        }
        // An empty window would otherwise read as "no limit". The source
        // must still exist and carry a valid header.
        Some(end) if end == start => {
            open_csv(csv_path)?;
            println!(
                "loaded 0 rows from {} into {}",
                csv_path.display(),
                config.db.path.display()
            );
            return Ok(());
        }
        Some(end) => end - start,
        None => 0,
    };

    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let mut options = config.load.options(start, max_records);
    if let Some(on_conflict) = on_conflict {
        options.on_conflict = on_conflict;
    }
    let reporter = progress.reporter();
    let result = load_csv(csv_path, &pool, &options, reporter.as_ref(), token).await;
    pool.close().await;
    let summary = result?;

    println!(
        "loaded {} rows from {} into {}",
        summary.written,
        csv_path.display(),
        config.db.path.display()
    );
    if summary.skipped > 0 || summary.conflicts > 0 {
        println!(
            "  skipped {} leading rows, {} rows already present",
            summary.skipped, summary.conflicts
        );
    }

    Ok(())
}

struct RowLoader<'a> {
    path: PathBuf,
    columns: Vec<&'static Column>,
    sql: String,
    options: &'a LoadOptions,
    progress: &'a dyn LoadProgressReporter,
    token: &'a CancellationToken,
}

impl RowLoader<'_> {
    async fn run(
        &self,
        conn: &mut SqliteConnection,
        reader: &mut csv::Reader<File>,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        let mut record = csv::StringRecord::new();
        let mut loaded = 0u64;

        while self.options.max_records == 0 || loaded < self.options.max_records {
            if self.token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let row = summary.skipped + loaded;
            let more = reader
                .read_record(&mut record)
                .map_err(|source| Error::Csv {
                    path: self.path.clone(),
                    what: format!("row {}", row),
                    source,
                })?;
            if !more {
                break;
            }

            let values = self.row_values(row, &record)?;
            let mut query = sqlx::query::<Sqlite>(&self.sql);
            for value in values {
                query = db::bind_value(query, value);
            }

            let result = query.execute(&mut *conn).await.map_err(|source| Error::Store {
                context: format!("{}: failed to insert row {}", self.path.display(), row),
                source,
            })?;

            if result.rows_affected() == 0 {
                summary.conflicts += 1;
            } else {
                summary.written += 1;
            }
            loaded += 1;

            if loaded % self.options.progress_every.max(1) == 0 {
                self.progress.report(LoadProgressEvent::Loading {
                    source: self.path.display().to_string(),
                    n: summary.written,
                });
            }
        }

        Ok(())
    }

    fn row_values(&self, row: u64, record: &csv::StringRecord) -> Result<Vec<StoreValue>> {
        let malformed = |reason: String| Error::MalformedRow {
            path: self.path.clone(),
            row,
            reason,
        };

        if record.len() != self.columns.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(malformed(format!(
                "expected {} fields, found {} (line {})",
                self.columns.len(),
                record.len(),
                line
            )));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for (column, raw) in self.columns.iter().zip(record.iter()) {
            let value = coerce_field(column, raw);
            if column.internal == IDENTITY && value == StoreValue::Null {
                return Err(malformed(format!("empty {}", IDENTITY)));
            }
            values.push(value);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::translate;

    #[test]
    fn test_empty_fields_coerced_by_type() {
        let stars = translate("repo.star_count").unwrap();
        let score = translate("default_score").unwrap();
        let lang = translate("repo.language").unwrap();
        assert_eq!(coerce_field(stars, ""), StoreValue::Integer(0));
        assert_eq!(coerce_field(score, ""), StoreValue::Real(0.0));
        assert_eq!(coerce_field(lang, ""), StoreValue::Null);
    }

    #[test]
    fn test_present_fields_typed() {
        let stars = translate("repo.star_count").unwrap();
        let score = translate("default_score").unwrap();
        let lang = translate("repo.language").unwrap();
        assert_eq!(coerce_field(stars, "1200"), StoreValue::Integer(1200));
        assert_eq!(coerce_field(score, "0.81234"), StoreValue::Real(0.81234));
        assert_eq!(coerce_field(lang, " Go"), StoreValue::Text(" Go".into()));
    }

    #[test]
    fn test_real_in_integer_column_truncated() {
        let stars = translate("repo.star_count").unwrap();
        assert_eq!(coerce_field(stars, "12.5"), StoreValue::Integer(12));
        assert_eq!(coerce_field(stars, "1e3"), StoreValue::Integer(1000));
    }

    #[test]
    fn test_open_csv_validates_header() {
        let tmp = tempfile::TempDir::new().unwrap();
        let good = tmp.path().join("good.csv");
        std::fs::write(&good, "repo.url,default_score\n").unwrap();
        let (_, columns) = open_csv(&good).unwrap();
        assert_eq!(columns.len(), 2);

        let bad = tmp.path().join("bad.csv");
        std::fs::write(&bad, "repo.url,repo.bogus\n").unwrap();
        assert!(matches!(open_csv(&bad), Err(Error::UnknownColumn { .. })));

        assert!(matches!(
            open_csv(&tmp.path().join("missing.csv")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_non_numeric_value_passed_through_as_text() {
        let stars = translate("repo.star_count").unwrap();
        assert_eq!(coerce_field(stars, "n/a"), StoreValue::Text("n/a".into()));
    }

    #[test]
    fn test_insert_sql_upsert_updates_non_identity_columns() {
        let columns = schema::translate_header(["repo.url", "repo.language"]).unwrap();
        assert_eq!(
            insert_sql(&columns, OnConflict::Upsert),
            "INSERT INTO repos (repo_url, repo_language) VALUES (?, ?) \
             ON CONFLICT(repo_url) DO UPDATE SET repo_language = excluded.repo_language"
        );
    }

    #[test]
    fn test_insert_sql_identity_only_upsert_is_do_nothing() {
        let columns = schema::translate_header(["repo.url"]).unwrap();
        assert!(insert_sql(&columns, OnConflict::Upsert).ends_with("DO NOTHING"));
    }

    #[test]
    fn test_insert_sql_skip_and_fail() {
        let columns = schema::translate_header(["repo.url", "default_score"]).unwrap();
        assert!(insert_sql(&columns, OnConflict::Skip)
            .ends_with("ON CONFLICT(repo_url) DO NOTHING"));
        assert!(!insert_sql(&columns, OnConflict::Fail).contains("ON CONFLICT"));
    }
}
