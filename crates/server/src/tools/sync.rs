//! sw_sync tool implementation.
//!
//! Fires a background-sync tag, replaying requests deferred under it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_client::{SyncReport, Worker};
use shelter_core::Error;

use super::json_result;

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync tag to fire (the worker handles "syncAnalytics").
    pub tag: String,
}

/// Output from the sw_sync tool.
#[derive(Debug, Clone, Serialize)]
pub struct SwSyncOutput {
    pub tag: String,
    #[serde(flatten)]
    pub report: SyncReport,
}

/// Implementation of the sw_sync tool.
pub async fn sync_impl(worker: &Worker, params: &SwSyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.trim();
    if tag.is_empty() {
        return Err(Error::InvalidInput("tag cannot be empty".to_string()).into());
    }

    let report = worker.on_sync(tag).await?;
    json_result(&SwSyncOutput { tag: tag.to_string(), report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output_text, worker};
    use shelter_client::ANALYTICS_SYNC_TAG;
    use shelter_core::Request;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sync_replays_deferred_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let worker = worker(&server.uri()).await;

        let request = Request::get(&format!("{}/api/events", server.uri())).unwrap();
        worker.cache().defer_request(ANALYTICS_SYNC_TAG, &request).await.unwrap();

        let params = SwSyncParams { tag: ANALYTICS_SYNC_TAG.into() };
        let result = sync_impl(&worker, &params).await.unwrap();
        let output: serde_json::Value = serde_json::from_str(&output_text(&result)).unwrap();
        assert_eq!(output["tag"], "syncAnalytics");
        assert_eq!(output["delivered"], 1);
        assert_eq!(output["retained"], 0);
    }

    #[tokio::test]
    async fn test_sync_empty_tag() {
        let server = MockServer::start().await;
        let worker = worker(&server.uri()).await;

        let params = SwSyncParams { tag: "  ".into() };
        assert!(sync_impl(&worker, &params).await.is_err());
    }
}
