//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use crate::tools::cache::{CacheDeleteParams, delete_impl, list_impl};
use crate::tools::fetch::fetch_impl;
use crate::tools::message::message_impl;
use crate::tools::sync::sync_impl;
use crate::tools::{SwFetchParams, SwMessageParams, SwSyncParams};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shelter_client::Worker;

/// The main MCP server handler for shelter.
#[derive(Clone)]
pub struct ShelterServer {
    worker: Arc<Worker>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShelterServer {
    /// Create a new server handler around a started worker.
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    /// Intercept one request.
    ///
    /// GET requests to the configured origin (or to allow-listed analytics
    /// hosts) are served through the caching strategies; anything else is
    /// reported as passed through.
    #[tool(
        description = "Intercept a request and serve it through the caching worker. Returns the strategy used and the response, or intercepted=false with a reason for pass-through requests."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, &params.0).await
    }

    #[tool(description = "Send a control message to the worker: SKIP_WAITING or GET_VERSION.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, &params.0).await
    }

    #[tool(description = "Fire a background sync tag, replaying requests deferred under it (e.g. syncAnalytics).")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, &params.0).await
    }

    #[tool(description = "List cache namespaces with their entry counts.")]
    async fn cache_namespaces(&self) -> Result<CallToolResult, McpError> {
        list_impl(self.worker.cache(), &self.worker.config().namespace()).await
    }

    #[tool(description = "Delete a cache namespace and all of its entries.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(self.worker.cache(), params.0).await
    }
}

impl ServerHandler for ShelterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shelter".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::worker;
    use wiremock::MockServer;

    #[tokio::test]
    async fn test_registers_all_tools() {
        let server = MockServer::start().await;
        let handler = ShelterServer::new(Arc::new(worker(&server.uri()).await));

        let mut names: Vec<String> = handler
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["cache_delete", "cache_namespaces", "sw_fetch", "sw_message", "sw_sync"]);
    }
}
