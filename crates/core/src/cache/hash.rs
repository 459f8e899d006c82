//! Cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the storage key for a request.
///
/// The fragment never reaches the network, so it is dropped before hashing.
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", &url("https://example.com/a.css"));
        let hash2 = compute_cache_key("GET", &url("https://example.com/a.css"));
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_ignores_fragment_and_method_case() {
        let plain = compute_cache_key("GET", &url("https://example.com/post.html"));
        let fragment = compute_cache_key("get", &url("https://example.com/post.html#comments"));
        assert_eq!(plain, fragment);
    }

    #[test]
    fn test_hash_keeps_query() {
        let a = compute_cache_key("GET", &url("https://example.com/?page=1"));
        let b = compute_cache_key("GET", &url("https://example.com/?page=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", &url("https://example.com"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
