//! Security headers applied to every response the worker returns.

use http::header::{HeaderName, HeaderValue};
use shelter_core::Response;

/// Fixed security header set. Names are lowercase as `HeaderName` stores them.
pub const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "no-referrer-when-downgrade"),
];

/// Overwrite the security headers on `response`, keeping status and body.
///
/// Idempotent: existing values for these names are replaced, never appended.
pub fn sanitize(mut response: Response) -> Response {
    for (name, value) in SECURITY_HEADERS {
        response
            .headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}
