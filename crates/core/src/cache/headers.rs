//! Header (de)serialization for stored rows.
//!
//! Rows hold a JSON list of `[name, hex(value)]` pairs. Values are kept as raw
//! bytes since HTTP allows non-UTF-8 octets in them.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::Error;

pub(crate) fn encode(headers: &HeaderMap) -> Result<String, Error> {
    let pairs: Vec<(&str, String)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), hex::encode(value.as_bytes())))
        .collect();
    serde_json::to_string(&pairs).map_err(|e| Error::CorruptEntry(format!("failed to encode headers: {e}")))
}

/// Pairs that no longer form a valid header are dropped rather than failing the row.
pub(crate) fn decode(json: &str) -> Result<HeaderMap, Error> {
    let pairs: Vec<(String, String)> =
        serde_json::from_str(json).map_err(|e| Error::CorruptEntry(format!("failed to decode headers: {e}")))?;

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let value = hex::decode(&value).ok().and_then(|bytes| HeaderValue::from_bytes(&bytes).ok());
        match (HeaderName::from_bytes(name.as_bytes()), value) {
            (Ok(name), Some(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "skipping undecodable stored header"),
        }
    }
    Ok(headers)
}
