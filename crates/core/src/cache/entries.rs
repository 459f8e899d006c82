//! Entry operations scoped to one namespace.

use std::time::Duration;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use super::headers;
use crate::config::ExpirationConfig;
use crate::{Error, Request, Response};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Stored entries are always keyed as GET; only read requests are ever cached.
const STORED_METHOD: &str = "GET";

/// Entry limits applied to a namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiration {
    pub max_entries: Option<usize>,
    pub max_age: Option<Duration>,
}

impl Expiration {
    pub fn is_enabled(&self) -> bool {
        self.max_entries.is_some() || self.max_age.is_some()
    }

    /// Oldest `stored_at` still considered live, formatted for comparison.
    fn cutoff(&self) -> Option<String> {
        let age = chrono::Duration::from_std(self.max_age?).ok()?;
        Utc::now()
            .checked_sub_signed(age)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl From<&ExpirationConfig> for Expiration {
    fn from(config: &ExpirationConfig) -> Self {
        Self { max_entries: config.max_entries, max_age: config.max_age_secs.map(Duration::from_secs) }
    }
}

/// Handle to one open namespace.
///
/// Cheap to clone; strategies hand clones to background revalidation tasks.
/// Entries written through a handle are tagged with its scope, and `expire`
/// only counts and evicts entries of that scope.
#[derive(Clone, Debug)]
pub struct CacheHandle {
    db: CacheDb,
    namespace: String,
    scope: String,
    expiration: Expiration,
}

impl CacheHandle {
    pub(crate) fn new(db: CacheDb, namespace: String, expiration: Expiration) -> Self {
        Self { db, namespace, scope: String::new(), expiration }
    }

    /// Apply entry limits to lookups and to `expire`.
    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Tag writes with `scope`, e.g. the strategy class that stored them.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up the stored response for `request`.
    ///
    /// `None` is a normal miss. Entries older than the handle's `max_age` are
    /// treated as missing even before `expire` removes them.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let namespace = self.namespace.clone();
        let key = compute_cache_key(STORED_METHOD, request.url());
        let cutoff = self.expiration.cutoff();

        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<(u16, String, String, Vec<u8>)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body FROM entries
                     WHERE namespace = ?1 AND key_hash = ?2
                     AND (?3 IS NULL OR stored_at >= ?3)",
                )?;

                let result = stmt.query_row(params![namespace, key, cutoff], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(|(status, status_text, headers_json, body)| {
            Ok(Response { status, status_text, headers: headers::decode(&headers_json)?, body: Bytes::from(body) })
        })
        .transpose()
    }

    /// Store a copy of `response` for `request`, replacing any previous entry.
    ///
    /// Fails if the namespace was deleted after this handle was opened, so a
    /// superseded handle can never resurrect its namespace.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_at(request, response, Utc::now()).await
    }

    pub(crate) async fn put_at(
        &self, request: &Request, response: &Response, stored_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let namespace = self.namespace.clone();
        let scope = self.scope.clone();
        let key = compute_cache_key(STORED_METHOD, request.url());
        let url = request.url().to_string();
        let status = response.status;
        let status_text = response.status_text.clone();
        let headers_json = headers::encode(&response.headers)?;
        let body = response.body.to_vec();
        let stored_at = stored_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        namespace, key_hash, url, method, status, status_text,
                        headers_json, body, stored_at, scope
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(namespace, key_hash) DO UPDATE SET
                        scope = excluded.scope,
                        url = excluded.url,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![namespace, key, url, STORED_METHOD, status, status_text, headers_json, body, stored_at, scope],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for `request`. Returns whether one existed.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let namespace = self.namespace.clone();
        let key = compute_cache_key(STORED_METHOD, request.url());
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count =
                    conn.execute("DELETE FROM entries WHERE namespace = ?1 AND key_hash = ?2", params![namespace, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this namespace.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        let namespace = self.namespace.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Evict this scope's entries older than `max_age`, then its oldest
    /// entries beyond `max_entries`.
    ///
    /// Returns the number of deleted entries.
    pub async fn expire(&self) -> Result<u64, Error> {
        if !self.expiration.is_enabled() {
            return Ok(0);
        }

        let namespace = self.namespace.clone();
        let scope = self.scope.clone();
        let cutoff = self.expiration.cutoff();
        let max = self.expiration.max_entries.map(|m| i64::try_from(m).unwrap_or(i64::MAX));
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let mut deleted = 0;

                if let Some(cutoff) = cutoff {
                    deleted += conn.execute(
                        "DELETE FROM entries WHERE namespace = ?1 AND scope = ?2 AND stored_at < ?3",
                        params![namespace, scope, cutoff],
                    )?;
                }

                if let Some(max) = max {
                    let count: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM entries WHERE namespace = ?1 AND scope = ?2",
                        params![namespace, scope],
                        |row| row.get(0),
                    )?;
                    if count > max {
                        deleted += conn.execute(
                            "DELETE FROM entries WHERE namespace = ?1 AND key_hash IN (
                                SELECT key_hash FROM entries WHERE namespace = ?1 AND scope = ?2
                                ORDER BY stored_at ASC, rowid ASC LIMIT ?3
                            )",
                            params![namespace, scope, count - max],
                        )?;
                    }
                }

                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_TYPE, HeaderValue};

    fn request(path: &str) -> Request {
        Request::get(&format!("https://example.com{path}")).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_match_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_namespace("app-v2").await.unwrap();
        let response =
            Response::new(200, "body { color: red }").with_header(CONTENT_TYPE, HeaderValue::from_static("text/css"));

        cache.put(&request("/css/main.min.css"), &response).await.unwrap();
        let cached = cache.match_request(&request("/css/main.min.css")).await.unwrap().unwrap();

        assert_eq!(cached.status, 200);
        assert_eq!(cached.status_text, "OK");
        assert_eq!(cached.body, response.body);
        assert_eq!(cached.header("content-type"), Some("text/css"));
    }

    #[tokio::test]
    async fn test_match_missing_is_none() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_namespace("app-v2").await.unwrap();
        assert!(cache.match_request(&request("/nope.js")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_namespace("app-v2").await.unwrap();

        cache.put(&request("/"), &Response::new(200, "first")).await.unwrap();
        cache.put(&request("/"), &Response::new(404, "second")).await.unwrap();

        let cached = cache.match_request(&request("/")).await.unwrap().unwrap();
        assert_eq!(cached.status, 404);
        assert_eq!(&cached.body[..], b"second");
        assert_eq!(cache.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_opaque_status_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_namespace("app-v2").await.unwrap();
        cache.put(&request("/font.woff2"), &Response::new(0, Bytes::new())).await.unwrap();

        let cached = cache.match_request(&request("/font.woff2")).await.unwrap().unwrap();
        assert!(cached.is_opaque());
        assert!(cached.body.is_empty());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open_namespace("app-v1").await.unwrap();
        let v2 = db.open_namespace("app-v2").await.unwrap();

        v1.put(&request("/"), &Response::new(200, "v1")).await.unwrap();
        assert!(v2.match_request(&request("/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_into_deleted_namespace_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stale = db.open_namespace("app-v1").await.unwrap();
        db.delete_namespace("app-v1").await.unwrap();

        let result = stale.put(&request("/"), &Response::new(200, "late")).await;
        assert!(result.is_err());
        assert!(db.list_namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_namespace("app-v2").await.unwrap();
        cache.put(&request("/a.js"), &Response::new(200, "a")).await.unwrap();

        assert!(cache.delete(&request("/a.js")).await.unwrap());
        assert!(!cache.delete(&request("/a.js")).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_max_entries_keeps_newest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db
            .open_namespace("app-v2")
            .await
            .unwrap()
            .with_expiration(Expiration { max_entries: Some(2), max_age: None });

        let now = Utc::now();
        for (i, path) in ["/1.css", "/2.css", "/3.css"].iter().enumerate() {
            let at = now - chrono::Duration::seconds(10 - i as i64);
            cache.put_at(&request(path), &Response::new(200, *path), at).await.unwrap();
        }

        assert_eq!(cache.expire().await.unwrap(), 1);
        assert!(cache.match_request(&request("/1.css")).await.unwrap().is_none());
        assert!(cache.match_request(&request("/3.css")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_max_age_hides_and_expires_old_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db
            .open_namespace("app-v2")
            .await
            .unwrap()
            .with_expiration(Expiration { max_entries: None, max_age: Some(Duration::from_secs(60)) });

        let old = Utc::now() - chrono::Duration::seconds(120);
        cache.put_at(&request("/old.png"), &Response::new(200, "old"), old).await.unwrap();
        cache.put(&request("/new.png"), &Response::new(200, "new")).await.unwrap();

        assert!(cache.match_request(&request("/old.png")).await.unwrap().is_none());
        assert_eq!(cache.expire().await.unwrap(), 1);
        assert_eq!(cache.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expire_counts_only_own_scope() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let base = db.open_namespace("app-v2").await.unwrap();
        let assets = base
            .clone()
            .with_scope("cache-first")
            .with_expiration(Expiration { max_entries: Some(1), max_age: None });
        let pages = base.with_scope("network-first");

        let earlier = Utc::now() - chrono::Duration::seconds(5);
        pages.put_at(&request("/"), &Response::new(200, "home"), earlier).await.unwrap();
        pages.put_at(&request("/about/"), &Response::new(200, "about"), earlier).await.unwrap();
        assets.put_at(&request("/a.css"), &Response::new(200, "a"), earlier).await.unwrap();
        assets.put(&request("/b.css"), &Response::new(200, "b")).await.unwrap();

        assert_eq!(assets.expire().await.unwrap(), 1);
        assert!(assets.match_request(&request("/a.css")).await.unwrap().is_none());
        assert!(assets.match_request(&request("/b.css")).await.unwrap().is_some());
        assert_eq!(assets.entry_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_expire_huge_limit_keeps_everything() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db
            .open_namespace("app-v2")
            .await
            .unwrap()
            .with_expiration(Expiration { max_entries: Some(usize::MAX), max_age: None });
        cache.put(&request("/a.js"), &Response::new(200, "a")).await.unwrap();
        cache.put(&request("/b.js"), &Response::new(200, "b")).await.unwrap();

        assert_eq!(cache.expire().await.unwrap(), 0);
        assert_eq!(cache.entry_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expire_disabled_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_namespace("app-v2").await.unwrap();
        cache.put(&request("/"), &Response::new(200, "x")).await.unwrap();
        assert_eq!(cache.expire().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");

        {
            let db = CacheDb::open(&path).await.unwrap();
            let cache = db.open_namespace("app-v2").await.unwrap();
            cache.put(&request("/manifest.json"), &Response::new(200, "{}")).await.unwrap();
        }

        let db = CacheDb::open(&path).await.unwrap();
        assert_eq!(db.list_namespaces().await.unwrap(), vec!["app-v2"]);
        let cache = db.open_namespace("app-v2").await.unwrap();
        let cached = cache.match_request(&request("/manifest.json")).await.unwrap().unwrap();
        assert_eq!(&cached.body[..], b"{}");
    }

    #[test]
    fn test_expiration_from_config() {
        let config = ExpirationConfig { max_entries: Some(50), max_age_secs: Some(3600) };
        let expiration = Expiration::from(&config);
        assert_eq!(expiration.max_entries, Some(50));
        assert_eq!(expiration.max_age, Some(Duration::from_secs(3600)));
        assert!(expiration.is_enabled());
        assert!(!Expiration::default().is_enabled());
    }
}
