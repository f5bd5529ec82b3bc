//! Forward-only schema migrations, recorded in `docsum_schema`.
//!
//! Each step runs inside its own transaction together with its bookkeeping
//! row, so a crash mid-step leaves the previous version intact.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// `(version, name, sql)`, ascending by version.
const STEPS: &[(u32, &str, &str)] = &[
    (1, "jobs", include_str!("sql/001_create_jobs.sql")),
    (2, "job_transitions", include_str!("sql/002_create_job_transitions.sql")),
    (3, "queue", include_str!("sql/003_create_queue.sql")),
];

pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _, _)| *version)
}

/// Highest applied version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    ensure_schema_table(conn)?;
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM docsum_schema",
        [],
        |r| r.get(0),
    )?)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let applied = current_version(conn)?;
    if applied > latest_version() {
        return Err(DatabaseError::Migration {
            version: applied,
            reason: format!(
                "database schema is newer than this build (max {})",
                latest_version()
            ),
        });
    }

    for &(version, name, sql) in STEPS.iter().filter(|(v, _, _)| *v > applied) {
        log::info!("Applying schema v{} ({})", version, name);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(|e| DatabaseError::Migration {
            version,
            reason: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO docsum_schema (version, name) VALUES (?1, ?2)",
            params![version, name],
        )?;
        tx.commit()?;
    }

    Ok(())
}

fn ensure_schema_table(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS docsum_schema (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )?;
    Ok(())
}
