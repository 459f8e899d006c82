//! Intercepted request model.

use std::fmt;
use std::str::FromStr;

use http::{HeaderMap, Method};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Resource-type hint supplied by the caller alongside a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Style,
    Script,
    Image,
    Font,
    Document,
    #[default]
    Other,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Document => "document",
            Destination::Other => "other",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = std::convert::Infallible;

    /// Hosts report many more destinations than we route on; anything
    /// unrecognised folds into `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "style" => Destination::Style,
            "script" => Destination::Script,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "document" => Destination::Document,
            _ => Destination::Other,
        })
    }
}

/// A resource fetch issued by the client application.
///
/// Built once through the `with_*` methods and never mutated afterwards; the
/// engine only ever reads it or clones it into background tasks.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    destination: Destination,
    headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, destination: Destination::Other, headers: HeaderMap::new() }
    }

    /// Parse `url` and build a GET request for it.
    pub fn get(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Only GET requests are read requests; everything else passes through untouched.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parses_url() {
        let req = Request::get("https://example.com/css/main.min.css").unwrap();
        assert_eq!(req.method(), &Method::GET);
        assert_eq!(req.url().path(), "/css/main.min.css");
        assert_eq!(req.destination(), Destination::Other);
        assert!(req.is_read());
    }

    #[test]
    fn test_get_rejects_relative_url() {
        let result = Request::get("/style.css");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_non_get_is_not_read() {
        let req = Request::new(Method::POST, Url::parse("https://example.com/api/events").unwrap());
        assert!(!req.is_read());
    }

    #[test]
    fn test_destination_from_str() {
        assert_eq!("style".parse::<Destination>().unwrap(), Destination::Style);
        assert_eq!("Document".parse::<Destination>().unwrap(), Destination::Document);
        assert_eq!("manifest".parse::<Destination>().unwrap(), Destination::Other);
        assert_eq!("".parse::<Destination>().unwrap(), Destination::Other);
    }

    #[test]
    fn test_destination_serde() {
        let json = serde_json::to_string(&Destination::Font).unwrap();
        assert_eq!(json, "\"font\"");
        let parsed: Destination = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(parsed, Destination::Image);
    }
}
