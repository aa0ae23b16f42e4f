//! Result materializer: raw store rows back into typed [`Repo`] records.
//!
//! `NULL` leaves the attribute at its zero value. Numeric attributes accept
//! any storage class; reals read into integer attributes are truncated and
//! clamped to the `i64` range. Text that does not parse as a number is a
//! [`Error::TypeCoercion`]. Columns the registry does
//! not know are skipped so newer databases stay readable.

use tracing::trace;

use crate::error::{Error, Result};
use crate::models::{parse_integer, real_to_integer, Repo, Slot, StoreValue};
use crate::schema;

/// Build a [`Repo`] from one result row.
pub fn materialize(row: &[(String, StoreValue)]) -> Result<Repo> {
    let mut repo = Repo::default();

    for (name, value) in row {
        let Some(column) = schema::by_internal(name) else {
            trace!(column = %name, "ignoring unregistered column");
            continue;
        };
        let Some(slot) = repo.slot(column.internal) else {
            continue;
        };
        if matches!(value, StoreValue::Null) {
            continue;
        }

        match slot {
            Slot::Integer(dst) => *dst = to_integer(name, value)?,
            Slot::Real(dst) => *dst = to_real(name, value)?,
            Slot::Text(dst) => *dst = Some(to_text(value)),
            Slot::Identity(dst) => *dst = to_text(value),
        }
    }

    Ok(repo)
}

fn coercion(column: &str, expected: &'static str, value: &StoreValue) -> Error {
    let found = match value {
        StoreValue::Text(s) => format!("text '{}'", s),
        StoreValue::Real(v) => format!("real {}", v),
        other => other.kind().to_string(),
    };
    Error::TypeCoercion {
        column: column.to_string(),
        expected,
        found,
    }
}

fn to_integer(column: &str, value: &StoreValue) -> Result<i64> {
    let converted = match value {
        StoreValue::Integer(v) => Some(*v),
        StoreValue::Real(v) => real_to_integer(*v),
        StoreValue::Text(s) => parse_integer(s),
        StoreValue::Null => Some(0),
    };
    converted.ok_or_else(|| coercion(column, "integer", value))
}

fn to_real(column: &str, value: &StoreValue) -> Result<f64> {
    match value {
        StoreValue::Integer(v) => Ok(*v as f64),
        StoreValue::Real(v) => Ok(*v),
        StoreValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| coercion(column, "real", value)),
        StoreValue::Null => Ok(0.0),
    }
}

fn to_text(value: &StoreValue) -> String {
    match value {
        StoreValue::Text(s) => s.clone(),
        StoreValue::Integer(v) => v.to_string(),
        StoreValue::Real(v) => v.to_string(),
        StoreValue::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, StoreValue)]) -> Vec<(String, StoreValue)> {
        cells
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_null_leaves_zero_values() {
        let repo = materialize(&row(&[
            ("repo_url", StoreValue::Text("https://github.com/a/b".into())),
            ("repo_language", StoreValue::Null),
            ("repo_star_count", StoreValue::Null),
            ("default_score", StoreValue::Null),
        ]))
        .unwrap();
        assert_eq!(repo.repo_url, "https://github.com/a/b");
        assert_eq!(repo.repo_language, None);
        assert_eq!(repo.repo_star_count, 0);
        assert_eq!(repo.default_score, 0.0);
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let repo = materialize(&row(&[
            ("repo_star_count", StoreValue::Text(" 42 ".into())),
            ("legacy_org_count", StoreValue::Text("7.0".into())),
            ("default_score", StoreValue::Text("0.75".into())),
            ("legacy_commit_frequency", StoreValue::Integer(3)),
        ]))
        .unwrap();
        assert_eq!(repo.repo_star_count, 42);
        assert_eq!(repo.legacy_org_count, 7);
        assert_eq!(repo.default_score, 0.75);
        assert_eq!(repo.legacy_commit_frequency, 3.0);
    }

    #[test]
    fn test_unparseable_numeric_text_fails() {
        let err = materialize(&row(&[("repo_star_count", StoreValue::Text("many".into()))]))
            .unwrap_err();
        match err {
            Error::TypeCoercion {
                column, expected, ..
            } => {
                assert_eq!(column, "repo_star_count");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_real_into_integer_is_truncated() {
        let repo = materialize(&row(&[
            ("repo_star_count", StoreValue::Real(12.5)),
            ("legacy_org_count", StoreValue::Text("3.75".into())),
            ("depsdev_dependent_count", StoreValue::Real(9_223_372_036_854_775_808.0)),
        ]))
        .unwrap();
        assert_eq!(repo.repo_star_count, 12);
        assert_eq!(repo.legacy_org_count, 3);
        assert_eq!(repo.depsdev_dependent_count, i64::MAX);
    }

    #[test]
    fn test_unknown_columns_ignored() {
        let repo = materialize(&row(&[
            ("repo_url", StoreValue::Text("u".into())),
            ("scorecard_rating", StoreValue::Real(9.1)),
            ("notes", StoreValue::Text("not a number".into())),
        ]))
        .unwrap();
        assert_eq!(repo.repo_url, "u");
    }

    #[test]
    fn test_empty_text_is_kept_distinct_from_null() {
        let repo = materialize(&row(&[
            ("repo_license", StoreValue::Text(String::new())),
            ("repo_language", StoreValue::Null),
        ]))
        .unwrap();
        assert_eq!(repo.repo_license.as_deref(), Some(""));
        assert_eq!(repo.repo_language, None);
    }
}
