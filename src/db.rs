//! Store access: pool setup, and conversion between SQLite cells and
//! [`StoreValue`].

use std::path::Path;
use std::str::FromStr;

use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{Error, Result};
use crate::models::{RawRow, StoreValue};

/// Open (creating if needed) the database at `db_path`.
///
/// The pool holds a single connection: the engine is single-writer and
/// every call runs to completion before the next starts.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(Error::store(format!(
            "invalid database path {}",
            db_path.display()
        )))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(Error::store(format!(
            "failed to open sqlite database {}",
            db_path.display()
        )))
}

/// Read every cell of a result row into its tagged form.
pub fn raw_row(row: &SqliteRow) -> Result<RawRow> {
    row.columns()
        .iter()
        .map(|column| {
            let name = column.name();
            let read = |e: sqlx::Error| Error::Store {
                context: format!("failed to read column '{}'", name),
                source: e,
            };

            let class = {
                let value = row.try_get_raw(column.ordinal()).map_err(read)?;
                if value.is_null() {
                    None
                } else {
                    Some(value.type_info().name().to_string())
                }
            };

            let i = column.ordinal();
            let cell = match class.as_deref() {
                None => StoreValue::Null,
                Some("INTEGER") => StoreValue::Integer(row.try_get_unchecked(i).map_err(read)?),
                Some("REAL") => StoreValue::Real(row.try_get_unchecked(i).map_err(read)?),
                Some("BLOB") => {
                    let bytes: Vec<u8> = row.try_get_unchecked(i).map_err(read)?;
                    StoreValue::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(_) => StoreValue::Text(row.try_get_unchecked(i).map_err(read)?),
            };

            Ok((name.to_string(), cell))
        })
        .collect()
}

/// Bind a tagged value onto a statement.
pub fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: StoreValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        StoreValue::Null => query.bind(None::<String>),
        StoreValue::Integer(v) => query.bind(v),
        StoreValue::Real(v) => query.bind(v),
        StoreValue::Text(v) => query.bind(v),
    }
}
