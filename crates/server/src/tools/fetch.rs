//! sw_fetch tool implementation.
//!
//! The interception boundary: runs one request through the worker and reports
//! either the response it produced or why it was passed through.

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_client::fetch::canonicalize;
use shelter_client::{Interception, Worker};
use shelter_core::{AppConfig, Destination, Error, Request, Response};
use url::Url;

use super::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// HTTP method (default: GET). Anything but GET is passed through.
    #[serde(default = "default_method")]
    pub method: String,

    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Resource-type hint: style, script, image, font, document or other.
    #[serde(default)]
    pub destination: Destination,

    /// Request headers forwarded to the network.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// False when the request was left to native network handling.
    pub intercepted: bool,
    /// Why the request was passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Strategy that served the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl SwFetchOutput {
    fn from_interception(interception: Interception) -> Self {
        match interception {
            Interception::Handled { strategy, response } => Self::handled(strategy.to_string(), &response),
            Interception::Declined(reason) => Self {
                intercepted: false,
                reason: Some(reason.to_string()),
                strategy: None,
                status: None,
                status_text: None,
                headers: BTreeMap::new(),
                body: None,
            },
        }
    }

    fn handled(strategy: String, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();

        Self {
            intercepted: true,
            reason: None,
            strategy: Some(strategy),
            status: Some(response.status),
            status_text: Some(response.status_text.clone()),
            headers,
            body: Some(String::from_utf8_lossy(&response.body).into_owned()),
        }
    }
}

/// Implementation of the sw_fetch tool.
///
/// A failed network-only request is returned as a tool error, unchanged.
pub async fn fetch_impl(worker: &Worker, params: &SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(worker.config(), params)?;
    let interception = worker.handle(&request).await?;
    json_result(&SwFetchOutput::from_interception(interception))
}

fn build_request(config: &AppConfig, params: &SwFetchParams) -> Result<Request, Error> {
    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::InvalidInput(format!("method {:?}: {e}", params.method)))?;

    let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", config.origin)))?;
    let url = canonicalize(&origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in &params.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidInput(format!("header {name}: {e}")))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| Error::InvalidInput(format!("header {name} value: {e}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(Request::new(method, url)
        .with_destination(params.destination)
        .with_headers(headers))
}
