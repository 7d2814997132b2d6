//! cache_entries tool implementation.
//!
//! Lists the request keys held by one store.

use offcache_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_entries tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntriesParams {
    /// Store name. Defaults to the current version's store.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntry {
    pub method: String,
    pub url: String,
}

/// Output from the cache_entries tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntriesOutput {
    pub name: String,
    pub entries: Vec<CacheEntry>,
}

/// Implementation of the cache_entries tool.
pub async fn entries_impl(
    cache: &CacheDb, current: &str, params: CacheEntriesParams,
) -> Result<CallToolResult, McpError> {
    let name = params.name.unwrap_or_else(|| current.to_string());

    if !cache.has_store(&name).await? {
        return Err(Error::CacheMiss(name).into());
    }

    let entries = cache
        .entry_keys(&name)
        .await?
        .into_iter()
        .map(|key| CacheEntry { method: key.method, url: key.url })
        .collect();

    json_result(&CacheEntriesOutput { name, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;
    use bytes::Bytes;
    use offcache_core::{Request, Response, ResponseType};
    use url::Url;

    #[tokio::test]
    async fn test_entries_missing_store() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let params = CacheEntriesParams { name: Some("nonexistent".into()) };

        let result = entries_impl(&cache, "memorial-service-v1", params).await;
        assert_eq!(result.unwrap_err().code.0, -32001);
    }

    #[tokio::test]
    async fn test_entries_defaults_to_current_store() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let url = Url::parse("https://example.github.io/memorial/index.html").unwrap();
        let response = Response {
            url: url.to_string(),
            status: 200,
            status_text: "OK".into(),
            response_type: ResponseType::Basic,
            headers: Vec::new(),
            body: Bytes::from_static(b"<html></html>"),
        };
        cache
            .put_entry("memorial-service-v1", &Request::get(url).key(), &response)
            .await
            .unwrap();

        let result = entries_impl(&cache, "memorial-service-v1", CacheEntriesParams { name: None })
            .await
            .unwrap();
        let listed: CacheEntriesOutput = output(&result);
        assert_eq!(listed.name, "memorial-service-v1");
        assert_eq!(listed.entries.len(), 1);
        assert_eq!(listed.entries[0].method, "GET");
        assert_eq!(listed.entries[0].url, "https://example.github.io/memorial/index.html");
    }
}
