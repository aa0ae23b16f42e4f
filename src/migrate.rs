use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::schema::{COLUMNS, IDENTITY, RANK, TABLE};

/// `CREATE TABLE` statement for the repos table, derived from the registry.
pub fn create_table_sql() -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|c| {
            if c.internal == IDENTITY {
                format!("    {} {} PRIMARY KEY", c.internal, c.ty.sql_type())
            } else {
                format!("    {} {}", c.internal, c.ty.sql_type())
            }
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        TABLE,
        columns.join(",\n")
    )
}

/// Create the repos table and its ranking index. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&create_table_sql())
        .execute(pool)
        .await
        .map_err(Error::store("failed to create table"))?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_{rank} ON {table}({rank} DESC)",
        table = TABLE,
        rank = RANK
    ))
    .execute(pool)
    .await
    .map_err(Error::store("failed to create index"))?;

    Ok(())
}
