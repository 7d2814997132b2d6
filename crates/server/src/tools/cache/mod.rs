//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and clearing cache stores.

pub mod delete;
pub mod entries;
pub mod keys;

pub use delete::{CacheDeleteParams, delete_impl};
pub use entries::{CacheEntriesParams, entries_impl};
pub use keys::{CacheKeysOutput, keys_impl};
