//! cache_delete tool implementation.
//!
//! Deletes one cache store and all of its entries.

use offcache_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Name of the store to delete.
    pub name: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub name: String,
    pub deleted: bool,
}

/// Implementation of the cache_delete tool.
///
/// Deleting the current store is allowed; the agent repopulates it on the
/// next install and from network fetches meanwhile.
pub async fn delete_impl(cache: &CacheDb, current: &str, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    if params.name.trim().is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".into()).into());
    }

    let deleted = cache.delete_store(&params.name).await?;
    if deleted && params.name == current {
        tracing::warn!(store = %params.name, "deleted the current cache store");
    }

    json_result(&CacheDeleteOutput { name: params.name, deleted })
}
