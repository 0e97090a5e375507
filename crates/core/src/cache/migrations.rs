//! Schema versioning for the cache database.
//!
//! `_migrations` holds one row per applied schema step. Opening a database
//! applies every step above the highest recorded version, each inside its
//! own transaction.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Schema steps in application order.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_partitions.sql")),
    (2, include_str!("../../migrations/002_submissions.sql")),
];

fn schema_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
}

fn apply(conn: &mut rusqlite::Connection, version: i64, sql: &str) -> Result<(), Error> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)
        .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
    tx.execute(
        "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;
    Ok(())
}

/// Bring the schema up to the newest step.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = schema_version(conn)?;
        for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            apply(conn, version, sql)?;
            tracing::debug!(version, "schema step applied");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}
