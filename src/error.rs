//! Error taxonomy for the ingestion and query engine.
//!
//! Orchestration code (CLI commands, downloads, SBOM steps) works with
//! `anyhow::Result`; everything under the engine returns [`Error`] so callers
//! can tell a schema problem from a bad row from a store failure.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Header names a column the schema registry does not know.
    #[error("unknown column name: {column}")]
    UnknownColumn { column: String },

    /// Header names the same column twice.
    #[error("duplicate column in header: {column}")]
    DuplicateColumn { column: String },

    /// Header lacks the identity column, so rows could not be keyed.
    #[error("header is missing the identity column '{column}'")]
    MissingIdentity { column: &'static str },

    /// A data row has the wrong shape or an unusable value.
    #[error("{}: row {row}: {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        row: u64,
        reason: String,
    },

    /// The delimited-text reader failed (encoding error, unbalanced quotes).
    #[error("{}: failed to read {what}: {source}", path.display())]
    Csv {
        path: PathBuf,
        what: String,
        #[source]
        source: csv::Error,
    },

    /// Source file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Criteria text could not be turned into a predicate.
    #[error("invalid filter criteria '{criteria}': {reason}")]
    InvalidFilter { criteria: String, reason: String },

    /// Underlying SQLite failure.
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// A stored value could not be read as its declared type.
    #[error("column '{column}': cannot read {found} as {expected}")]
    TypeCoercion {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap a sqlx error with a short description of what was being done.
    pub fn store(context: impl Into<String>) -> impl FnOnce(sqlx::Error) -> Error {
        let context = context.into();
        move |source| Error::Store { context, source }
    }

    /// True for errors raised while validating the header, before any write.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownColumn { .. }
                | Error::DuplicateColumn { .. }
                | Error::MissingIdentity { .. }
        )
    }
}
