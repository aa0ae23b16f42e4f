//! Schema registry: the fixed mapping between the criticality-score CSV
//! header and the columns of the `repos` table.
//!
//! Both the loader (write path) and the materializer (read path) resolve
//! columns through this table, and `migrate` derives the table definition
//! from it, so the three cannot drift apart.

use crate::error::{Error, Result};

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// SQLite type name used in the table definition.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// One registered column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Name as it appears in the CSV header.
    pub external: &'static str,
    /// Name of the SQLite column.
    pub internal: &'static str,
    pub ty: ColumnType,
}

const fn col(external: &'static str, internal: &'static str, ty: ColumnType) -> Column {
    Column {
        external,
        internal,
        ty,
    }
}

/// Table holding every ingested repository.
pub const TABLE: &str = "repos";

/// Primary key column.
pub const IDENTITY: &str = "repo_url";

/// Column results are ranked by, descending.
pub const RANK: &str = "default_score";

/// Every column, in table-definition order.
pub static COLUMNS: [Column; 20] = [
    col("repo.url", "repo_url", ColumnType::Text),
    col("repo.language", "repo_language", ColumnType::Text),
    col("repo.license", "repo_license", ColumnType::Text),
    col("repo.star_count", "repo_star_count", ColumnType::Integer),
    col("repo.created_at", "repo_created_at", ColumnType::Text),
    col("repo.updated_at", "repo_updated_at", ColumnType::Text),
    col("legacy.created_since", "legacy_created_since", ColumnType::Integer),
    col("legacy.updated_since", "legacy_updated_since", ColumnType::Integer),
    col("legacy.contributor_count", "legacy_contributor_count", ColumnType::Integer),
    col("legacy.org_count", "legacy_org_count", ColumnType::Integer),
    col("legacy.commit_frequency", "legacy_commit_frequency", ColumnType::Real),
    col("legacy.recent_release_count", "legacy_recent_release_count", ColumnType::Integer),
    col("legacy.updated_issues_count", "legacy_updated_issues_count", ColumnType::Integer),
    col("legacy.closed_issues_count", "legacy_closed_issues_count", ColumnType::Integer),
    col("legacy.issue_comment_frequency", "legacy_issue_comment_frequency", ColumnType::Real),
    col("legacy.github_mention_count", "legacy_github_mention_count", ColumnType::Integer),
    col("depsdev.dependent_count", "depsdev_dependent_count", ColumnType::Integer),
    col("default_score", "default_score", ColumnType::Real),
    col("collection_date", "collection_date", ColumnType::Text),
    col("worker_commit_id", "worker_commit_id", ColumnType::Text),
];

/// Translate a CSV header name into its registered column.
pub fn translate(external: &str) -> Result<&'static Column> {
    COLUMNS
        .iter()
        .find(|c| c.external == external)
        .ok_or_else(|| Error::UnknownColumn {
            column: external.to_string(),
        })
}

/// Look up a column by its SQLite name. `None` means the store returned a
/// column this version does not know about.
pub fn by_internal(internal: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.internal == internal)
}

/// Translate a full header row.
///
/// Fails on the first unknown name, on a repeated column, or when the
/// identity column is absent.
pub fn translate_header<'a, I>(header: I) -> Result<Vec<&'static Column>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut columns: Vec<&'static Column> = Vec::new();
    for name in header {
        let column = translate(name)?;
        if columns.iter().any(|c| c.internal == column.internal) {
            return Err(Error::DuplicateColumn {
                column: name.to_string(),
            });
        }
        columns.push(column);
    }

    if !columns.iter().any(|c| c.internal == IDENTITY) {
        return Err(Error::MissingIdentity { column: IDENTITY });
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_known_column() {
        let column = translate("repo.star_count").unwrap();
        assert_eq!(column.internal, "repo_star_count");
        assert_eq!(column.ty, ColumnType::Integer);
    }

    #[test]
    fn test_translate_unknown_column() {
        let err = translate("repo.stars").unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column } if column == "repo.stars"));
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_internal_and_external_names_unique() {
        for (i, a) in COLUMNS.iter().enumerate() {
            for b in &COLUMNS[i + 1..] {
                assert_ne!(a.external, b.external);
                assert_ne!(a.internal, b.internal);
            }
        }
    }

    #[test]
    fn test_identity_and_rank_registered() {
        assert_eq!(by_internal(IDENTITY).unwrap().ty, ColumnType::Text);
        assert_eq!(by_internal(RANK).unwrap().ty, ColumnType::Real);
        assert!(by_internal("not_a_column").is_none());
    }

    #[test]
    fn test_translate_header_rejects_duplicates() {
        let err = translate_header(["repo.url", "repo.language", "repo.language"]).unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { .. }));
    }

    #[test]
    fn test_translate_header_requires_identity() {
        let err = translate_header(["repo.language", "default_score"]).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity { column: "repo_url" }));
    }

    #[test]
    fn test_translate_header_preserves_order() {
        let columns = translate_header(["default_score", "repo.url"]).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.internal).collect();
        assert_eq!(names, vec!["default_score", "repo_url"]);
    }
}
