//! Network access for the worker.
//!
//! ### Fetcher
//! - `Fetcher` is the seam between strategies and the transport; the reqwest
//!   backed `HttpFetcher` is the production implementation.
//! - Any completed exchange is a `Response`, whatever its status. Only
//!   transport failures are errors.
//!
//! ### Fetch Guard
//! - Races every fetch against a timer (default 5s).
//! - Timeouts become `Error::FetchTimeout`, everything else `Error::Network`.
//! - No retries at this layer.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod guard;
pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use shelter_core::{AppConfig, Error, Request, Response};
use std::time::Instant;

pub use guard::FetchGuard;
pub use self::url::{UrlError, canonicalize, resolve_resource, same_origin};

/// Stable transport trait used by the fetch guard.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform `request` on the network.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shelter/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "shelter/0.1".to_string(), max_bytes: 5 * 1024 * 1024, max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_bytes, ..Default::default() }
    }
}

/// reqwest-backed fetcher.
///
/// Carries no timeout of its own; the guard owns the deadline and drops the
/// in-flight request when it fires.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = request.url();

        let response = self
            .http
            .request(request.method().clone(), url.clone())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", url, e)))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers: header::HeaderMap = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {}: {}", url, e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        let mut response = Response::new(status.as_u16(), bytes);
        response.headers = headers;
        Ok(response)
    }
}
