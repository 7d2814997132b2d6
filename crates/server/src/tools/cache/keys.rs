//! cache_keys tool implementation.
//!
//! Lists every cache store name, oldest first.

use offcache_core::CacheDb;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub stores: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(cache: &CacheDb) -> Result<CallToolResult, McpError> {
    let stores = cache.store_names().await?;
    json_result(&CacheKeysOutput { stores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;

    #[tokio::test]
    async fn test_keys_lists_stores() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        cache.open_store("memorial-service-v0").await.unwrap();
        cache.open_store("memorial-service-v1").await.unwrap();

        let result = keys_impl(&cache).await.unwrap();
        let keys: CacheKeysOutput = output(&result);
        assert_eq!(keys.stores, vec!["memorial-service-v0", "memorial-service-v1"]);
    }
}
