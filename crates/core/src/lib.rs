//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - The offline agent (provisioner, reaper, interceptor)
//! - The lifecycle host that dispatches install/activate/fetch
//! - Unified error types
//! - Configuration structures

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod request;
pub mod response;

pub use agent::{
    ActivateReport, Agent, AgentSettings, ClientControl, Fetched, InstallReport, Interception, Network, PendingWrite,
    ResponseSource,
};
pub use cache::{CacheDb, CacheStorage};
pub use config::AppConfig;
pub use error::Error;
pub use lifecycle::{Registered, Registration, WorkerState};
pub use request::{Request, RequestKey};
pub use response::{Response, ResponseType};
