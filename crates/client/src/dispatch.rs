//! Per-request entry point.
//!
//! Order of checks: read requests only, then origin (foreign URLs pass through
//! unless allow-listed as network-only), then the activation gate, then
//! routing. Everything that is intercepted leaves through `sanitize`.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use shelter_core::{AppConfig, CacheDb, Error, Expiration, Request, Response};
use url::Url;

use crate::fetch::same_origin;
use crate::lifecycle::{Lifecycle, LifecycleEvent, WorkerState};
use crate::router::{RouteTable, StrategyClass};
use crate::sanitize::sanitize;
use crate::strategy::StrategyEngine;
use crate::sync::{ANALYTICS_SYNC_TAG, BackgroundSync};

/// Why a request was left to native network handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclineReason {
    NonGet,
    CrossOrigin,
    /// A newer version has taken over.
    Redundant,
}

impl DeclineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineReason::NonGet => "non-get",
            DeclineReason::CrossOrigin => "cross-origin",
            DeclineReason::Redundant => "redundant",
        }
    }
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    Handled { strategy: StrategyClass, response: Response },
    Declined(DeclineReason),
}

pub struct Dispatcher {
    config: Arc<AppConfig>,
    origin: Url,
    routes: RouteTable,
    engine: StrategyEngine,
    db: CacheDb,
    lifecycle: Arc<Lifecycle>,
    sync: BackgroundSync,
}

impl Dispatcher {
    pub fn new(
        config: Arc<AppConfig>, db: CacheDb, engine: StrategyEngine, lifecycle: Arc<Lifecycle>, sync: BackgroundSync,
    ) -> Result<Self, Error> {
        let routes = RouteTable::new(&config.routes)?;
        let origin =
            Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", config.origin)))?;
        Ok(Self { config, origin, routes, engine, db, lifecycle, sync })
    }

    /// Serve one intercepted request.
    ///
    /// Only a failed network-only fetch is an error; every other failure has
    /// already been turned into a cached or synthetic response.
    pub async fn handle(&self, request: &Request) -> Result<Interception, Error> {
        if !request.is_read() {
            return Ok(Interception::Declined(DeclineReason::NonGet));
        }

        let url = request.url().as_str();
        if !same_origin(request.url(), &self.origin) && !self.routes.is_network_only(url) {
            return Ok(Interception::Declined(DeclineReason::CrossOrigin));
        }

        if self.lifecycle.wait_active().await == WorkerState::Redundant {
            return Ok(Interception::Declined(DeclineReason::Redundant));
        }

        let strategy = self.routes.classify(url);
        tracing::debug!(url, %strategy, destination = %request.destination(), "dispatching");

        let response = match strategy {
            StrategyClass::NetworkOnly => self.network_only(request).await?,
            _ => match self.db.open_namespace(&self.config.namespace()).await {
                Ok(cache) => {
                    let cache = cache.with_scope(strategy.as_str()).with_expiration(self.limits(strategy));
                    self.engine.execute(strategy, request, &cache).await?
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cache unavailable, serving without it");
                    self.engine.uncached(strategy, request).await?
                }
            },
        };

        Ok(Interception::Handled { strategy, response: sanitize(response) })
    }

    fn limits(&self, strategy: StrategyClass) -> Expiration {
        let rules = &self.config.expiration;
        match strategy {
            StrategyClass::CacheFirst => Expiration::from(&rules.cache_first),
            StrategyClass::NetworkFirst => Expiration::from(&rules.network_first),
            StrategyClass::StaleWhileRevalidate => Expiration::from(&rules.stale_while_revalidate),
            StrategyClass::NetworkOnly => Expiration::default(),
        }
    }

    async fn network_only(&self, request: &Request) -> Result<Response, Error> {
        let err = match self.engine.network_only(request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if self.config.defer_failed_analytics {
            match self.sync.defer(request).await {
                Ok(_) => self.lifecycle.emit(LifecycleEvent::SyncRequested { tag: ANALYTICS_SYNC_TAG.into() }),
                Err(defer_err) => tracing::warn!(url = %request.url(), error = %defer_err, "could not defer request"),
            }
        }
        Err(err)
    }
}
