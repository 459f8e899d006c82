//! Schema migrations.
//!
//! Each step runs in its own transaction together with its `_migrations` row,
//! so a crash mid-upgrade leaves the store at the last complete version.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Ordered schema steps: (version, name, SQL).
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "namespaces", include_str!("../../migrations/001_namespaces.sql")),
    (2, "deferred_events", include_str!("../../migrations/002_deferred_events.sql")),
    (3, "entry_scope", include_str!("../../migrations/003_entry_scope.sql")),
];

/// Latest schema version this build knows about.
pub const SCHEMA_VERSION: i64 = 3;

/// Bring the schema up to `SCHEMA_VERSION`. Returns the number of steps applied.
///
/// Refuses to touch a store written by a newer build.
pub async fn run(conn: &Connection) -> Result<usize, Error> {
    conn.call(|conn| -> Result<usize, Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
        if current > SCHEMA_VERSION {
            return Err(Error::MigrationFailed(format!(
                "store is at schema {current}, this build supports up to {SCHEMA_VERSION}"
            )));
        }

        let mut applied = 0;
        for &(version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
            apply(conn, version, name, sql).map_err(|e| Error::MigrationFailed(format!("{version} {name}: {e}")))?;
            tracing::debug!(version, name, "applied migration");
            applied += 1;
        }
        Ok(applied)
    })
    .await
    .map_err(Error::from)
}

fn apply(conn: &mut rusqlite::Connection, version: i64, name: &str, sql: &str) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.execute(
        "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![version, name, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()
}
