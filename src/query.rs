//! Query builder and executor.
//!
//! Predicates are joined with `AND`; every value is a bound parameter. The
//! only interpolated text is the column name and operator token, both taken
//! from fixed vocabularies by [`crate::criteria::parse`]. Results are always
//! ordered by ranking score, highest first.

use sqlx::{Sqlite, SqlitePool};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::criteria::{self, Predicate};
use crate::db;
use crate::error::{Error, Result};
use crate::materialize::materialize;
use crate::models::Repo;
use crate::schema::{IDENTITY, RANK, TABLE};

/// A ready-to-run parameterized statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub sql: String,
    /// Bound in order; `LIMIT` and `OFFSET` come last.
    pub params: Vec<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Compose predicates into a single statement.
///
/// `max_results == 0` selects `default_max_results`; it does not mean
/// unbounded.
pub fn build(
    predicates: &[Predicate],
    max_results: u32,
    skip: u32,
    default_max_results: u32,
) -> QueryPlan {
    let mut sql = format!("SELECT * FROM {}", TABLE);
    let mut params = Vec::new();

    for (i, predicate) in predicates.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });

        let values = predicate.params();
        if predicate.op.is_set() {
            let placeholders = vec!["?"; values.len()].join(", ");
            sql.push_str(&format!(
                "{} {} ({})",
                predicate.field, predicate.op, placeholders
            ));
        } else {
            sql.push_str(&format!("{} {} ?", predicate.field, predicate.op));
        }
        params.extend(values.into_iter().map(str::to_string));
    }

    sql.push_str(&format!(
        " ORDER BY {} DESC, {} ASC LIMIT ? OFFSET ?",
        RANK, IDENTITY
    ));

    let limit = if max_results == 0 {
        default_max_results
    } else {
        max_results
    };

    QueryPlan {
        sql,
        params,
        limit: i64::from(limit),
        offset: i64::from(skip),
    }
}

/// Run a plan and materialize every returned row.
pub async fn execute(
    pool: &SqlitePool,
    plan: &QueryPlan,
    token: &CancellationToken,
) -> Result<Vec<Repo>> {
    debug!(sql = %plan.sql, params = ?plan.params, "running query");

    let mut query = sqlx::query::<Sqlite>(&plan.sql);
    for param in &plan.params {
        query = query.bind(param);
    }
    query = query.bind(plan.limit).bind(plan.offset);

    let rows = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(Error::Cancelled),
        rows = query.fetch_all(pool) => rows.map_err(Error::store("failed to query repos"))?,
    };

    rows.iter()
        .map(|row| db::raw_row(row).and_then(|raw| materialize(&raw)))
        .collect()
}

/// Parse criteria, build the statement, and run it.
///
/// Malformed criteria are rejected before the store is touched.
pub async fn query_repos<S: AsRef<str>>(
    pool: &SqlitePool,
    criteria: &[S],
    max_results: u32,
    skip: u32,
    default_max_results: u32,
    token: &CancellationToken,
) -> Result<Vec<Repo>> {
    let predicates = criteria::parse_all(criteria)?;
    let plan = build(&predicates, max_results, skip, default_max_results);
    execute(pool, &plan, token).await
}

/// CLI entry point for `bomfactory query`.
///
/// Text mode prints a count and the first few matches; `json` prints every
/// matched record.
pub async fn run_query(
    config: &Config,
    filters: &[String],
    max_results: u32,
    skip: u32,
    json: bool,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let repos = query_repos(
        &pool,
        filters,
        max_results,
        skip,
        config.query.default_max_results,
        token,
    )
    .await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
        return Ok(());
    }

    println!("Found {} repositories matching the criteria", repos.len());
    for (i, repo) in repos.iter().take(PREVIEW_ROWS).enumerate() {
        println!(
            "Repo {}: {} (Stars: {}, Language: {})",
            i + 1,
            repo.repo_url,
            repo.repo_star_count,
            repo.repo_language.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

const PREVIEW_ROWS: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::parse;

    #[test]
    fn test_build_without_predicates() {
        let plan = build(&[], 10, 0, 100);
        assert_eq!(
            plan.sql,
            "SELECT * FROM repos ORDER BY default_score DESC, repo_url ASC LIMIT ? OFFSET ?"
        );
        assert!(plan.params.is_empty());
        assert_eq!(plan.limit, 10);
        assert_eq!(plan.offset, 0);
    }

    #[test]
    fn test_build_joins_with_and() {
        let predicates = vec![
            parse("repo_language:=:Go").unwrap(),
            parse("repo_star_count:>:50").unwrap(),
        ];
        let plan = build(&predicates, 3, 2, 100);
        assert_eq!(
            plan.sql,
            "SELECT * FROM repos WHERE repo_language = ? AND repo_star_count > ? \
             ORDER BY default_score DESC, repo_url ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(plan.params, vec!["Go", "50"]);
        assert_eq!((plan.limit, plan.offset), (3, 2));
    }

    #[test]
    fn test_values_never_interpolated() {
        let predicates = vec![parse("repo_license:=:x' OR '1'='1").unwrap()];
        let plan = build(&predicates, 1, 0, 100);
        assert!(!plan.sql.contains("OR '1'"));
        assert_eq!(plan.params, vec!["x' OR '1'='1"]);
    }

    #[test]
    fn test_set_membership_expands_placeholders() {
        let predicates = vec![parse("repo_language:NOT IN:Go,Rust,C").unwrap()];
        let plan = build(&predicates, 5, 0, 100);
        assert!(plan.sql.contains("repo_language NOT IN (?, ?, ?)"));
        assert_eq!(plan.params, vec!["Go", "Rust", "C"]);
    }

    #[test]
    fn test_zero_max_results_uses_default() {
        let plan = build(&[], 0, 7, 100);
        assert_eq!(plan.limit, 100);
        assert_eq!(plan.offset, 7);
    }
}
