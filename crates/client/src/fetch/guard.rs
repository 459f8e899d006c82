//! Bounded-time fetches.

use std::sync::Arc;
use std::time::Duration;

use shelter_core::{Error, Request, Response};

use super::Fetcher;

/// Default fetch deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Races a `Fetcher` against a timer.
///
/// Whichever settles first decides the outcome. When the timer wins the fetch
/// future is dropped, which cancels the underlying request for transports that
/// support it; its result is discarded either way.
#[derive(Clone)]
pub struct FetchGuard {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
}

impl FetchGuard {
    pub fn new(fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch `request`, failing with `FetchTimeout` past the deadline and
    /// `Network` for any other failure.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => {
                tracing::warn!(url = %request.url(), error = %err, "fetch failed");
                if err.is_fetch_failure() { Err(err) } else { Err(Error::Network(err.to_string())) }
            }
            Err(_) => {
                tracing::warn!(url = %request.url(), timeout_ms = self.timeout.as_millis() as u64, "fetch timed out");
                Err(Error::FetchTimeout(format!("{} exceeded {}ms", request.url(), self.timeout.as_millis())))
            }
        }
    }
}
