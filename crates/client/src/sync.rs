//! Background sync for deferred analytics requests.

use std::time::Duration;

use serde::Serialize;
use shelter_core::cache::DeferredEvent;
use shelter_core::{CacheDb, Error, Request, SyncConfig};

use crate::fetch::FetchGuard;

/// Tag under which failed network-only requests are queued.
pub const ANALYTICS_SYNC_TAG: &str = "syncAnalytics";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Replayed and removed from the queue.
    pub delivered: usize,
    /// Still queued for the next sync.
    pub retained: usize,
    /// Removed without delivery: unreadable, past retention, or out of attempts.
    pub dropped: usize,
}

/// Queue and replay of deferred requests.
///
/// Delivery is at-least-once with no ordering across events: an event is
/// removed after a replay got a non-5xx answer, or dropped once it outlives
/// the configured retention or attempt limit.
#[derive(Clone)]
pub struct BackgroundSync {
    db: CacheDb,
    guard: FetchGuard,
    limits: SyncConfig,
}

impl BackgroundSync {
    pub fn new(db: CacheDb, guard: FetchGuard, limits: SyncConfig) -> Self {
        Self { db, guard, limits }
    }

    pub fn is_known_tag(tag: &str) -> bool {
        tag == ANALYTICS_SYNC_TAG
    }

    /// Queue `request` for the analytics sync.
    pub async fn defer(&self, request: &Request) -> Result<i64, Error> {
        let id = self.db.defer_request(ANALYTICS_SYNC_TAG, request).await?;
        tracing::debug!(id, url = %request.url(), "deferred request for background sync");
        Ok(id)
    }

    /// Replay every event queued under `tag`. Unknown tags do nothing.
    pub async fn replay(&self, tag: &str) -> Result<SyncReport, Error> {
        let mut report = SyncReport::default();
        if !Self::is_known_tag(tag) {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(report);
        }

        if let Some(secs) = self.limits.max_retention_secs {
            let pruned = self.db.prune_events(tag, Duration::from_secs(secs)).await?;
            if pruned > 0 {
                tracing::warn!(tag, pruned, "dropped deferred events past retention");
                report.dropped += pruned as usize;
            }
        }

        for event in self.db.pending_events(tag).await? {
            let request = match event.to_request() {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(id = event.id, error = %err, "dropping unreadable deferred event");
                    self.db.complete_event(event.id).await?;
                    report.dropped += 1;
                    continue;
                }
            };

            match self.guard.fetch(&request).await {
                Ok(response) if response.status < 500 => {
                    self.db.complete_event(event.id).await?;
                    report.delivered += 1;
                }
                Ok(response) => {
                    tracing::debug!(id = event.id, status = response.status, "replay rejected");
                    self.retry_later(&event, &mut report).await?;
                }
                Err(_) => self.retry_later(&event, &mut report).await?,
            }
        }

        tracing::info!(
            tag,
            delivered = report.delivered,
            retained = report.retained,
            dropped = report.dropped,
            "background sync finished"
        );
        Ok(report)
    }

    async fn retry_later(&self, event: &DeferredEvent, report: &mut SyncReport) -> Result<(), Error> {
        let attempts = event.attempts + 1;
        if self.limits.max_attempts.is_some_and(|max| attempts >= i64::from(max)) {
            tracing::warn!(id = event.id, attempts, url = %event.url, "giving up on deferred event");
            self.db.complete_event(event.id).await?;
            report.dropped += 1;
        } else {
            self.db.record_attempt(event.id).await?;
            report.retained += 1;
        }
        Ok(())
    }
}
