//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shelter server.

pub mod cache;
pub mod fetch;
pub mod message;
pub mod sync;

pub use fetch::SwFetchParams;
pub use message::SwMessageParams;
pub use sync::SwSyncParams;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use shelter_core::Error;

/// Pretty-printed JSON tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use rmcp::model::CallToolResult;
    use shelter_client::{FetchConfig, HttpFetcher, Worker};
    use shelter_core::{AppConfig, CacheDb};

    /// Active worker for `origin` with an empty critical resource list.
    pub(crate) async fn worker(origin: &str) -> Worker {
        let config = Arc::new(AppConfig { origin: origin.to_string(), critical_resources: vec![], ..Default::default() });
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(config.as_ref())).unwrap());
        let worker = Worker::new(config, db, fetcher).unwrap();
        worker.start().await.unwrap();
        worker
    }

    /// Text of the first content block.
    pub(crate) fn output_text(result: &CallToolResult) -> String {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content")
            .to_string()
    }
}
