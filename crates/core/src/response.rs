//! Response model shared by the cache store, fetch guard and strategies.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;

/// Body of the synthetic page served when a document cannot be reached at all.
pub const OFFLINE_PAGE_BODY: &str = "Offline - this page needs a network connection to load";

/// Body of the generic synthetic response for assets that were never cached.
pub const NETWORK_OFFLINE_BODY: &str = "Network offline";

/// An HTTP response as seen by the engine.
///
/// The body is a reference-counted buffer, so `clone()` yields an independent,
/// separately consumable copy without duplicating the bytes. A status of `0`
/// marks an opaque cross-origin response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Build a response with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: reason_phrase(status).to_string(), headers: HeaderMap::new(), body: body.into() }
    }

    /// Synthetic 503 served to document requests when neither network nor cache answers.
    pub fn offline_page() -> Self {
        Self::new(503, OFFLINE_PAGE_BODY)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain;charset=UTF-8"))
    }

    /// Synthetic 503 for anything else that could not be fetched and was never cached.
    pub fn network_offline() -> Self {
        Self::new(503, NETWORK_OFFLINE_BODY)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.status == 0
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_page_shape() {
        let res = Response::offline_page();
        assert_eq!(res.status, 503);
        assert_eq!(res.status_text, "Service Unavailable");
        assert_eq!(res.header("content-type"), Some("text/plain;charset=UTF-8"));
        assert_eq!(res.body, Bytes::from_static(OFFLINE_PAGE_BODY.as_bytes()));
    }

    #[test]
    fn test_network_offline_shape() {
        let res = Response::network_offline();
        assert_eq!(res.status, 503);
        assert_eq!(res.status_text, "Service Unavailable");
        assert!(res.headers.is_empty());
        assert_eq!(&res.body[..], b"Network offline");
    }

    #[test]
    fn test_opaque_has_no_reason() {
        let res = Response::new(0, "");
        assert!(res.is_opaque());
        assert!(!res.is_ok());
        assert_eq!(res.status_text, "");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Response::new(200, "body");
        let mut copy = original.clone();
        copy.body = Bytes::from_static(b"changed");
        assert_eq!(&original.body[..], b"body");
        assert!(original.is_ok());
    }
}
