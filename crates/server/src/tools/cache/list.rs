//! cache_namespaces tool implementation.
//!
//! Lists every namespace in the store with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_core::{CacheDb, NamespaceInfo};

use crate::tools::json_result;

/// Output from the cache_namespaces tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheNamespacesOutput {
    /// Namespace the running version serves from.
    pub current: String,
    pub namespaces: Vec<NamespaceInfo>,
}

/// Implementation of the cache_namespaces tool.
pub async fn list_impl(cache: &CacheDb, current: &str) -> Result<CallToolResult, McpError> {
    let namespaces = cache.namespace_stats().await?;
    json_result(&CacheNamespacesOutput { current: current.to_string(), namespaces })
}
