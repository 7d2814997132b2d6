//! agent_install, agent_activate and agent_status tool implementations.

use offcache_core::{CacheStorage, Registration, WorkerState};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output from the agent_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentStatusOutput {
    pub cache_name: String,
    pub state: String,
    /// Whether fetches are being intercepted.
    pub active: bool,
    pub skipped_waiting: bool,
    pub open_clients: usize,
    pub controlled_clients: usize,
    /// All store names, in creation order.
    pub stores: Vec<String>,
    /// Manifest URLs missing from the current store.
    pub missing: Vec<String>,
}

/// Run install, then activation.
pub async fn install_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let registered = registration.register().await?;
    json_result(&registered)
}

pub async fn activate_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let report = registration.activate().await?;
    json_result(&report)
}

pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let agent = registration.agent();
    let state: WorkerState = registration.state().await;
    let output = AgentStatusOutput {
        cache_name: agent.cache_name().to_string(),
        state: state.to_string(),
        active: registration.is_active(),
        skipped_waiting: registration.skipped_waiting(),
        open_clients: registration.open_clients(),
        controlled_clients: registration.controlled_clients(),
        stores: agent.storage().names().await?,
        missing: agent
            .missing_manifest_entries()
            .await?
            .into_iter()
            .map(|key| key.url)
            .collect(),
    };
    json_result(&output)
}
