//! sw_message tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_client::{ControlMessage, Worker};

use super::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message type: SKIP_WAITING or GET_VERSION.
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(worker: &Worker, params: &SwMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::parse(serde_json::json!({ "type": params.message_type }))?;
    let reply = worker.on_message(message).await?;
    json_result(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output_text, worker};
    use wiremock::MockServer;

    #[tokio::test]
    async fn test_get_version() {
        let server = MockServer::start().await;
        let worker = worker(&server.uri()).await;

        let params = SwMessageParams { message_type: "GET_VERSION".into() };
        let result = message_impl(&worker, &params).await.unwrap();
        let reply: serde_json::Value = serde_json::from_str(&output_text(&result)).unwrap();
        assert_eq!(reply, serde_json::json!({"version": "v2.0.0"}));
    }

    #[tokio::test]
    async fn test_skip_waiting_when_active_is_ok() {
        let server = MockServer::start().await;
        let worker = worker(&server.uri()).await;

        let params = SwMessageParams { message_type: "SKIP_WAITING".into() };
        let result = message_impl(&worker, &params).await.unwrap();
        let reply: serde_json::Value = serde_json::from_str(&output_text(&result)).unwrap();
        assert_eq!(reply, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_unknown_message() {
        let server = MockServer::start().await;
        let worker = worker(&server.uri()).await;

        let params = SwMessageParams { message_type: "CLAIM".into() };
        let err = message_impl(&worker, &params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
