//! Client code for offcache.
//!
//! This crate provides the HTTP `Network` implementation the agent and its
//! host use for manifest provisioning, cache misses and pass-through.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, classify};
