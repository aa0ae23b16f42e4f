//! Core data types that flow through loading and querying.

use serde::Serialize;

/// One repository row from the criticality-score dataset.
///
/// Text attributes are `Option` so that an absent value stays distinct from
/// an empty string. Numeric attributes default to zero when the store holds
/// `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Repo {
    pub repo_url: String,
    pub repo_language: Option<String>,
    pub repo_license: Option<String>,
    pub repo_star_count: i64,
    pub repo_created_at: Option<String>,
    pub repo_updated_at: Option<String>,
    pub legacy_created_since: i64,
    pub legacy_updated_since: i64,
    pub legacy_contributor_count: i64,
    pub legacy_org_count: i64,
    pub legacy_commit_frequency: f64,
    pub legacy_recent_release_count: i64,
    pub legacy_updated_issues_count: i64,
    pub legacy_closed_issues_count: i64,
    pub legacy_issue_comment_frequency: f64,
    pub legacy_github_mention_count: i64,
    pub depsdev_dependent_count: i64,
    pub default_score: f64,
    pub collection_date: Option<String>,
    pub worker_commit_id: Option<String>,
}

/// Mutable handle to one attribute of a [`Repo`], typed by storage class.
pub enum Slot<'a> {
    Integer(&'a mut i64),
    Real(&'a mut f64),
    Text(&'a mut Option<String>),
    /// The identity attribute is never absent on a stored row.
    Identity(&'a mut String),
}

impl Repo {
    /// Resolve a store column name to the attribute it fills.
    pub fn slot(&mut self, column: &str) -> Option<Slot<'_>> {
        let slot = match column {
            "repo_url" => Slot::Identity(&mut self.repo_url),
            "repo_language" => Slot::Text(&mut self.repo_language),
            "repo_license" => Slot::Text(&mut self.repo_license),
            "repo_star_count" => Slot::Integer(&mut self.repo_star_count),
            "repo_created_at" => Slot::Text(&mut self.repo_created_at),
            "repo_updated_at" => Slot::Text(&mut self.repo_updated_at),
            "legacy_created_since" => Slot::Integer(&mut self.legacy_created_since),
            "legacy_updated_since" => Slot::Integer(&mut self.legacy_updated_since),
            "legacy_contributor_count" => Slot::Integer(&mut self.legacy_contributor_count),
            "legacy_org_count" => Slot::Integer(&mut self.legacy_org_count),
            "legacy_commit_frequency" => Slot::Real(&mut self.legacy_commit_frequency),
            "legacy_recent_release_count" => Slot::Integer(&mut self.legacy_recent_release_count),
            "legacy_updated_issues_count" => Slot::Integer(&mut self.legacy_updated_issues_count),
            "legacy_closed_issues_count" => Slot::Integer(&mut self.legacy_closed_issues_count),
            "legacy_issue_comment_frequency" => {
                Slot::Real(&mut self.legacy_issue_comment_frequency)
            }
            "legacy_github_mention_count" => Slot::Integer(&mut self.legacy_github_mention_count),
            "depsdev_dependent_count" => Slot::Integer(&mut self.depsdev_dependent_count),
            "default_score" => Slot::Real(&mut self.default_score),
            "collection_date" => Slot::Text(&mut self.collection_date),
            "worker_commit_id" => Slot::Text(&mut self.worker_commit_id),
            _ => return None,
        };
        Some(slot)
    }
}

/// A single cell as SQLite stores it.
///
/// Produced by the store-access layer for reads and by the loader for
/// writes; nothing else needs to guess a value's runtime type.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl StoreValue {
    /// Short name of the storage class, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreValue::Null => "NULL",
            StoreValue::Integer(_) => "INTEGER",
            StoreValue::Real(_) => "REAL",
            StoreValue::Text(_) => "TEXT",
        }
    }
}

/// Convert a real into an integer attribute value.
///
/// The fraction is dropped and values beyond the `i64` range clamp to its
/// bounds. `NaN` has no integer value.
pub fn real_to_integer(v: f64) -> Option<i64> {
    if v.is_nan() {
        return None;
    }
    // `as` truncates toward zero and saturates at the bounds.
    Some(v as i64)
}

/// Parse numeric text into an integer attribute value.
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(real_to_integer))
}

/// One result row: column name and value, in select order.
pub type RawRow = Vec<(String, StoreValue)>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, COLUMNS};

    #[test]
    fn test_every_registered_column_has_matching_slot() {
        let mut repo = Repo::default();
        for column in &COLUMNS {
            let slot = repo
                .slot(column.internal)
                .unwrap_or_else(|| panic!("no slot for {}", column.internal));
            let matches = matches!(
                (column.ty, slot),
                (ColumnType::Integer, Slot::Integer(_))
                    | (ColumnType::Real, Slot::Real(_))
                    | (ColumnType::Text, Slot::Text(_))
                    | (ColumnType::Text, Slot::Identity(_))
            );
            assert!(matches, "slot type mismatch for {}", column.internal);
        }
    }

    #[test]
    fn test_unknown_slot() {
        let mut repo = Repo::default();
        assert!(repo.slot("stars").is_none());
    }

    #[test]
    fn test_real_to_integer_truncates_and_clamps() {
        assert_eq!(real_to_integer(12.5), Some(12));
        assert_eq!(real_to_integer(-3.9), Some(-3));
        assert_eq!(real_to_integer(9.3e18), Some(i64::MAX));
        assert_eq!(real_to_integer(-9.3e18), Some(i64::MIN));
        assert_eq!(real_to_integer(f64::INFINITY), Some(i64::MAX));
        assert_eq!(real_to_integer(f64::NAN), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer(" 42 "), Some(42));
        assert_eq!(parse_integer("7.0"), Some(7));
        assert_eq!(parse_integer("12.5"), Some(12));
        assert_eq!(parse_integer("1e3"), Some(1000));
        assert_eq!(parse_integer("NaN"), None);
        assert_eq!(parse_integer("lots"), None);
    }
}
