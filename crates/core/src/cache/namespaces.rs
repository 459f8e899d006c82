//! Namespace management: open, list, inspect, delete.

use super::connection::CacheDb;
use super::entries::{CacheHandle, Expiration};
use crate::Error;
use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Summary of one namespace for host introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceInfo {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

impl CacheDb {
    /// Open a namespace, creating it on first use.
    ///
    /// Idempotent: opening an existing namespace leaves its entries alone.
    pub async fn open_namespace(&self, name: &str) -> Result<CacheHandle, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("namespace name cannot be empty".into()));
        }

        let owned = name.to_string();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheHandle::new(self.clone(), name.to_string(), Expiration::default()))
    }

    /// Names of every namespace in the store, sorted.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Every namespace with its entry count.
    pub async fn namespace_stats(&self) -> Result<Vec<NamespaceInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<NamespaceInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT n.name, COUNT(e.key_hash), n.created_at
                     FROM namespaces n LEFT JOIN entries e ON e.namespace = n.name
                     GROUP BY n.name ORDER BY n.name",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(NamespaceInfo {
                            name: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            created_at: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// Returns whether the namespace existed; deleting an absent one is a no-op.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE namespace = ?1", params![name])?;
                let removed = tx.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response};

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = db.open_namespace("app-v1").await.unwrap();
        first
            .put(&Request::get("https://example.com/a.css").unwrap(), &Response::new(200, "a"))
            .await
            .unwrap();

        let again = db.open_namespace("app-v1").await.unwrap();
        assert_eq!(again.entry_count().await.unwrap(), 1);
        assert_eq!(db.list_namespaces().await.unwrap(), vec!["app-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_open_rejects_empty_name() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(matches!(db.open_namespace("").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["other-app-v1", "app-v2", "app-v1"] {
            db.open_namespace(name).await.unwrap();
        }
        assert_eq!(db.list_namespaces().await.unwrap(), vec!["app-v1", "app-v2", "other-app-v1"]);
    }

    #[tokio::test]
    async fn test_delete_removes_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get("https://example.com/").unwrap();
        let old = db.open_namespace("app-v1").await.unwrap();
        old.put(&request, &Response::new(200, "old")).await.unwrap();

        assert!(db.delete_namespace("app-v1").await.unwrap());
        assert!(db.list_namespaces().await.unwrap().is_empty());

        let reopened = db.open_namespace("app-v1").await.unwrap();
        assert!(reopened.match_request(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.delete_namespace("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_stats_counts_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.open_namespace("app-v2").await.unwrap();
        db.open_namespace("app-v1").await.unwrap();
        for path in ["a.css", "b.js"] {
            let request = Request::get(&format!("https://example.com/{path}")).unwrap();
            handle.put(&request, &Response::new(200, path)).await.unwrap();
        }

        let stats = db.namespace_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "app-v1");
        assert_eq!(stats[0].entries, 0);
        assert_eq!(stats[1].entries, 2);
    }
}
