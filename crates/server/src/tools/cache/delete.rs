//! cache_delete tool implementation.
//!
//! Deletes one namespace and all of its entries.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_core::{CacheDb, Error};

use crate::tools::json_result;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Namespace to delete, e.g. "xguider-blog-v1.0.0".
    pub namespace: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub namespace: String,
    /// False when the namespace did not exist.
    pub deleted: bool,
}

/// Implementation of the cache_delete tool.
pub async fn delete_impl(cache: &CacheDb, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    if params.namespace.trim().is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".to_string()).into());
    }

    let deleted = cache.delete_namespace(&params.namespace).await?;
    json_result(&CacheDeleteOutput { namespace: params.namespace, deleted })
}
