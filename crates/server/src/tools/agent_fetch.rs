//! agent_fetch tool implementation.
//!
//! Dispatches a request from the page client through the registration, so
//! it is intercepted exactly as a controlled page's request would be.

use std::collections::BTreeMap;

use offcache_core::{Registration, Request, ResponseSource, ResponseType};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// Path relative to the scope (e.g. "./index.html") or absolute URL.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchOutput {
    /// The URL requested, resolved against the scope.
    pub url: String,
    /// The URL the response came from.
    pub response_url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub source: ResponseSource,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
    /// True while the response is still being written to the cache.
    pub write_pending: bool,
}

/// Implementation of the agent_fetch tool.
pub async fn fetch_impl(registration: &Registration, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let scope = &registration.agent().settings().scope;
    let mut request = Request::resolve(&params.method, scope, &params.url)?;
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let url = request.url.to_string();
    let fetched = registration.fetch(request).await?;
    let response = &fetched.response;

    let output = AgentFetchOutput {
        url,
        response_url: response.url.clone(),
        status: response.status,
        status_text: response.status_text.clone(),
        response_type: response.response_type,
        source: fetched.source,
        headers: response.headers.clone(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        write_pending: fetched.write.is_some(),
    };

    // The write keeps running on the runtime after the handle is dropped.
    json_result(&output)
}
