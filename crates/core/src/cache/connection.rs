//! Store handle: one SQLite connection shared by every namespace.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// WAL keeps readers unblocked while a put commits; foreign keys make a put
/// into a deleted namespace fail instead of recreating it.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

/// The cache store.
///
/// Every clone talks to the same background connection thread, so single
/// statements never interleave and same-key puts are last-write-wins in
/// completion order.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the store file at `path` and migrate it.
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::InvalidInput(format!("cannot create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        let db = Self::init(conn).await?;
        tracing::debug!(path = %path.display(), "opened cache store");
        Ok(db)
    }

    /// Non-durable store for tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Flush and close the store. Calls through any other clone fail afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(Error::Database)
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(Error::Database)?;

        let applied = migrations::run(&conn).await?;
        if applied > 0 {
            tracing::info!(applied, schema = migrations::SCHEMA_VERSION, "migrated cache store");
        }

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pragma(db: &CacheDb, name: &'static str) -> String {
        db.conn
            .call(move |conn| {
                conn.query_row(&format!("PRAGMA {name}"), [], |row| {
                    row.get::<_, tokio_rusqlite::rusqlite::types::Value>(0)
                })
            })
            .await
            .map(|v| match v {
                tokio_rusqlite::rusqlite::types::Value::Integer(i) => i.to_string(),
                tokio_rusqlite::rusqlite::types::Value::Text(s) => s,
                other => format!("{other:?}"),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(pragma(&db, "foreign_keys").await, "1");
    }

    #[tokio::test]
    async fn test_file_store_uses_wal_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite");

        let db = CacheDb::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(pragma(&db, "journal_mode").await, "wal");
    }

    #[tokio::test]
    async fn test_close_fails_other_clones() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let other = db.clone();

        db.close().await.unwrap();
        assert!(matches!(other.list_namespaces().await, Err(Error::Database(_))));
    }
}
