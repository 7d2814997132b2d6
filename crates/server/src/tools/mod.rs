//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offcache host.
#![allow(unused_imports)]

pub mod agent_fetch;
pub mod cache;
pub mod lifecycle;

pub use agent_fetch::{AgentFetchOutput, AgentFetchParams};
pub use lifecycle::AgentStatusOutput;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::EncodeFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by tool tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use offcache_core::{Agent, AgentSettings, CacheDb, Error, Network, Registration, Request, Response, ResponseType};
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use url::Url;

    pub const SCOPE: &str = "https://example.github.io/memorial/";

    /// Serves fixed bodies by URL; everything else fails as if offline.
    #[derive(Default)]
    pub struct StaticNetwork {
        pages: Mutex<HashMap<String, Response>>,
    }

    impl StaticNetwork {
        pub fn serve(&self, path: &str, status: u16, body: &str) {
            let url = Url::parse(SCOPE).unwrap().join(path).unwrap();
            let response = Response {
                url: url.to_string(),
                status,
                status_text: String::new(),
                response_type: ResponseType::Basic,
                headers: vec![("content-type".into(), "text/html".into())],
                body: Bytes::from(body.to_string()),
            };
            self.pages.lock().unwrap().insert(url.to_string(), response);
        }
    }

    #[async_trait]
    impl Network for StaticNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.pages
                .lock()
                .unwrap()
                .get(&request.key().url)
                .cloned()
                .ok_or_else(|| Error::Network(format!("offline: {}", request.url)))
        }
    }

    pub async fn registration(network: Arc<StaticNetwork>) -> (Arc<Registration>, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let settings = AgentSettings::new(
            "memorial-service-v1",
            Url::parse(SCOPE).unwrap(),
            &["./", "./index.html", "./manifest.json"],
            "./index.html",
        )
        .unwrap();
        let agent = Agent::new(settings, Arc::new(db.clone()), network);
        (Arc::new(Registration::new(agent)), db)
    }

    pub fn serving_manifest() -> Arc<StaticNetwork> {
        let network = StaticNetwork::default();
        network.serve("./", 200, "<html>root</html>");
        network.serve("./index.html", 200, "<html>index</html>");
        network.serve("./manifest.json", 200, "{\"name\":\"memorial\"}");
        Arc::new(network)
    }

    /// Decode the JSON text content of a tool result.
    pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
