//! offcache server entry point.
//!
//! Boots the offline agent for the configured version, registers it
//! (install + activate), then serves the host tools over MCP stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{FetchClient, FetchConfig};
use offcache_core::{Agent, AgentSettings, AppConfig, CacheDb, Registration};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(cache_name = %config.cache_name, scope = %config.scope, "Starting offcache on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config)?)?;
    let agent = Agent::new(AgentSettings::from_config(&config)?, Arc::new(db.clone()), Arc::new(network));
    let registration = Arc::new(Registration::new(agent));

    // The MCP session is the one page client this host serves.
    registration.connect_client();

    if let Err(e) = registration.register().await {
        tracing::warn!(error = %e, "initial registration failed; retry with agent_install");
    }

    let handler = handler::OffcacheServer::new(registration, db);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
