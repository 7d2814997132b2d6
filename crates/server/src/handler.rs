//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::agent_fetch::{AgentFetchParams, fetch_impl};
use crate::tools::cache::{CacheDeleteParams, CacheEntriesParams, delete_impl, entries_impl, keys_impl};
use crate::tools::lifecycle::{activate_impl, install_impl, status_impl};

use offcache_core::{CacheDb, Registration};
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

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    cache: CacheDb,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffcacheServer {
    /// Create a new server handler.
    pub fn new(registration: Arc<Registration>, cache: CacheDb) -> Self {
        Self { tool_router: Self::tool_router(), registration, cache }
    }

    #[tool(description = "Install the agent: cache the manifest into the current store, then activate it.")]
    async fn agent_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.registration).await
    }

    #[tool(description = "Activate an installed agent: delete stores from other versions and claim clients.")]
    async fn agent_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.registration).await
    }

    #[tool(description = "Report worker state, client counts, cache stores and missing manifest entries.")]
    async fn agent_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    /// Issue a request as a controlled page would.
    ///
    /// GET requests are served cache-first with an offline fallback; other
    /// methods go to the network untouched.
    #[tool(description = "Fetch a URL through the offline agent. Returns status, source (cache/network/offline) and body.")]
    async fn agent_fetch(&self, params: Parameters<AgentFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, params.0).await
    }

    #[tool(description = "List cache store names, oldest first.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.cache).await
    }

    #[tool(description = "List the request keys held by a cache store (default: the current version's store).")]
    async fn cache_entries(&self, params: Parameters<CacheEntriesParams>) -> Result<CallToolResult, McpError> {
        entries_impl(&self.cache, self.registration.agent().cache_name(), params.0).await
    }

    #[tool(description = "Delete a cache store and all of its entries.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.cache, self.registration.agent().cache_name(), params.0).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
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
