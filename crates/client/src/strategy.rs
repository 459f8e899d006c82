//! The four caching algorithms.
//!
//! Every algorithm except network-only resolves to a response: a cached one, a
//! fresh one, or a synthetic 503. Cache lookup failures are treated as misses
//! and cache write failures are logged; neither reaches the caller.

use shelter_core::{AppConfig, CacheHandle, Error, Request, Response};

use crate::fetch::FetchGuard;
use crate::router::StrategyClass;

/// Which completed fetches may be written to the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Only cache opaque (status 0) or 2xx responses.
    pub strict_status: bool,
}

impl CachePolicy {
    pub fn is_cacheable(&self, response: &Response) -> bool {
        !self.strict_status || response.is_ok() || response.is_opaque()
    }
}

impl From<&AppConfig> for CachePolicy {
    fn from(config: &AppConfig) -> Self {
        Self { strict_status: config.strict_status }
    }
}

/// Runs a strategy against one namespace.
#[derive(Clone)]
pub struct StrategyEngine {
    guard: FetchGuard,
    policy: CachePolicy,
}

impl StrategyEngine {
    pub fn new(guard: FetchGuard, policy: CachePolicy) -> Self {
        Self { guard, policy }
    }

    /// Serve `request` with `class`. Only network-only can return an error.
    pub async fn execute(&self, class: StrategyClass, request: &Request, cache: &CacheHandle) -> Result<Response, Error> {
        match class {
            StrategyClass::CacheFirst => Ok(self.cache_first(request, cache).await),
            StrategyClass::NetworkFirst => Ok(self.network_first(request, cache).await),
            StrategyClass::StaleWhileRevalidate => Ok(self.stale_while_revalidate(request, cache).await),
            StrategyClass::NetworkOnly => self.network_only(request).await,
        }
    }

    /// Serve without a cache, for when the namespace cannot be opened.
    ///
    /// Failures resolve to the same synthetic responses the cached variants
    /// fall back to.
    pub async fn uncached(&self, class: StrategyClass, request: &Request) -> Result<Response, Error> {
        match (class, self.guard.fetch(request).await) {
            (_, Ok(response)) => Ok(response),
            (StrategyClass::NetworkOnly, Err(err)) => Err(err),
            (StrategyClass::NetworkFirst, Err(_)) => Ok(Response::offline_page()),
            (_, Err(_)) => Ok(Response::network_offline()),
        }
    }

    pub async fn cache_first(&self, request: &Request, cache: &CacheHandle) -> Response {
        if let Some(cached) = self.lookup(request, cache).await {
            tracing::debug!(url = %request.url(), namespace = cache.namespace(), "cache hit");
            return cached;
        }

        match self.guard.fetch(request).await {
            Ok(response) => {
                self.store(request, &response, cache).await;
                response
            }
            Err(_) => Response::network_offline(),
        }
    }

    pub async fn network_first(&self, request: &Request, cache: &CacheHandle) -> Response {
        match self.guard.fetch(request).await {
            Ok(response) => {
                self.store(request, &response, cache).await;
                response
            }
            Err(err) => {
                tracing::debug!(url = %request.url(), error = %err, "network failed, falling back to cache");
                self.lookup(request, cache)
                    .await
                    .unwrap_or_else(Response::offline_page)
            }
        }
    }

    /// Return the cached entry at once and refresh it in the background.
    ///
    /// The revalidation task is the only fetch for this request. Without a
    /// cached entry the caller waits for that same task.
    pub async fn stale_while_revalidate(&self, request: &Request, cache: &CacheHandle) -> Response {
        let cached = self.lookup(request, cache).await;

        let engine = self.clone();
        let background_request = request.clone();
        let background_cache = cache.clone();
        let revalidation = tokio::spawn(async move {
            let result = engine.guard.fetch(&background_request).await;
            if let Ok(response) = &result {
                engine.store(&background_request, response, &background_cache).await;
            }
            result
        });

        if let Some(cached) = cached {
            tracing::debug!(url = %request.url(), "serving stale entry while revalidating");
            return cached;
        }

        match revalidation.await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => Response::network_offline(),
            Err(err) => {
                tracing::warn!(url = %request.url(), error = %err, "revalidation task failed");
                Response::network_offline()
            }
        }
    }

    /// Fetch and return verbatim. No cache access.
    pub async fn network_only(&self, request: &Request) -> Result<Response, Error> {
        self.guard.fetch(request).await
    }

    async fn lookup(&self, request: &Request, cache: &CacheHandle) -> Option<Response> {
        match cache.match_request(request).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(url = %request.url(), error = %err, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, request: &Request, response: &Response, cache: &CacheHandle) {
        if !self.policy.is_cacheable(response) {
            tracing::debug!(url = %request.url(), status = response.status, "response not cacheable");
            return;
        }

        if let Err(err) = cache.put(request, response).await {
            tracing::warn!(url = %request.url(), error = %err, "cache write failed");
            return;
        }

        match cache.expire().await {
            Ok(0) => {}
            Ok(evicted) => tracing::debug!(namespace = cache.namespace(), evicted, "expired cache entries"),
            Err(err) => tracing::warn!(namespace = cache.namespace(), error = %err, "cache expiration failed"),
        }
    }
}
