//! Deferred request queue for background sync.
//!
//! Delivery is at-least-once: an event leaves the queue only after a replay
//! succeeded, and replays carry no ordering guarantee.

use std::time::Duration;

use super::connection::CacheDb;
use super::headers;
use crate::{Error, Request};
use chrono::{SecondsFormat, Utc};
use http::Method;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use url::Url;

/// A request waiting to be replayed under a sync tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredEvent {
    pub id: i64,
    pub tag: String,
    pub method: String,
    pub url: String,
    pub headers_json: String,
    pub queued_at: String,
    pub attempts: i64,
}

impl DeferredEvent {
    /// Rebuild the original request.
    pub fn to_request(&self) -> Result<Request, Error> {
        let method =
            Method::from_bytes(self.method.as_bytes()).map_err(|e| Error::CorruptEntry(format!("method: {e}")))?;
        let url = Url::parse(&self.url).map_err(|e| Error::CorruptEntry(format!("url: {e}")))?;
        Ok(Request::new(method, url).with_headers(headers::decode(&self.headers_json)?))
    }
}

impl CacheDb {
    /// Queue `request` under `tag`. Returns the event id.
    pub async fn defer_request(&self, tag: &str, request: &Request) -> Result<i64, Error> {
        let tag = tag.to_string();
        let method = request.method().to_string();
        let url = request.url().to_string();
        let headers_json = headers::encode(request.headers())?;
        let queued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO deferred_events (tag, method, url, headers_json, queued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![tag, method, url, headers_json, queued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Every event queued under `tag`.
    pub async fn pending_events(&self, tag: &str) -> Result<Vec<DeferredEvent>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<DeferredEvent>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, tag, method, url, headers_json, queued_at, attempts
                     FROM deferred_events WHERE tag = ?1 ORDER BY id",
                )?;
                let events = stmt
                    .query_map(params![tag], |row| {
                        Ok(DeferredEvent {
                            id: row.get(0)?,
                            tag: row.get(1)?,
                            method: row.get(2)?,
                            url: row.get(3)?,
                            headers_json: row.get(4)?,
                            queued_at: row.get(5)?,
                            attempts: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a delivered event.
    pub async fn complete_event(&self, id: i64) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM deferred_events WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Drop events under `tag` queued more than `max_age` ago. Returns how many.
    pub async fn prune_events(&self, tag: &str, max_age: Duration) -> Result<u64, Error> {
        let tag = tag.to_string();
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let cutoff = cutoff.to_rfc3339_opts(SecondsFormat::Micros, true);

        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM deferred_events WHERE tag = ?1 AND queued_at < ?2",
                    params![tag, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count a failed replay; the event stays queued.
    pub async fn record_attempt(&self, id: i64) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("UPDATE deferred_events SET attempts = attempts + 1 WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use http::header::HeaderValue;

    #[tokio::test]
    async fn test_defer_and_rebuild_request() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-event", HeaderValue::from_static("pageview"));
        let request = Request::get("https://plausible.io/api/event").unwrap().with_headers(headers);

        let id = db.defer_request("syncAnalytics", &request).await.unwrap();
        let pending = db.pending_events("syncAnalytics").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].attempts, 0);

        let rebuilt = pending[0].to_request().unwrap();
        assert_eq!(rebuilt.method(), &Method::GET);
        assert_eq!(rebuilt.url().as_str(), "https://plausible.io/api/event");
        assert_eq!(rebuilt.headers().get("x-event").unwrap(), "pageview");
    }

    #[tokio::test]
    async fn test_pending_filters_by_tag() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get("https://example.com/api/ping").unwrap();
        db.defer_request("syncAnalytics", &request).await.unwrap();
        db.defer_request("other", &request).await.unwrap();

        assert_eq!(db.pending_events("syncAnalytics").await.unwrap().len(), 1);
        assert!(db.pending_events("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attempt_then_complete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = db
            .defer_request("syncAnalytics", &Request::get("https://example.com/api/x").unwrap())
            .await
            .unwrap();

        db.record_attempt(id).await.unwrap();
        db.record_attempt(id).await.unwrap();
        assert_eq!(db.pending_events("syncAnalytics").await.unwrap()[0].attempts, 2);

        db.complete_event(id).await.unwrap();
        assert!(db.pending_events("syncAnalytics").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_drops_only_old_events_for_tag() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get("https://plausible.io/api/event").unwrap();
        let old = db.defer_request("syncAnalytics", &request).await.unwrap();
        let fresh = db.defer_request("syncAnalytics", &request).await.unwrap();
        let other = db.defer_request("other", &request).await.unwrap();
        db.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE deferred_events SET queued_at = '2020-01-01T00:00:00.000000Z' WHERE id IN (?1, ?2)",
                    params![old, other],
                )
            })
            .await
            .unwrap();

        let week = Duration::from_secs(7 * 24 * 60 * 60);
        assert_eq!(db.prune_events("syncAnalytics", week).await.unwrap(), 1);

        let pending = db.pending_events("syncAnalytics").await.unwrap();
        assert_eq!(pending.iter().map(|e| e.id).collect::<Vec<_>>(), vec![fresh]);
        assert_eq!(db.pending_events("other").await.unwrap().len(), 1);
    }
}
