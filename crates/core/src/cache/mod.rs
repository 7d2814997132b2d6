//! SQLite-backed versioned cache stores.
//!
//! This module provides persistent, named request→response stores using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Open-or-create, enumerate and delete of named stores
//! - Keyed entries (method + normalized URL, SHA-256 hashed)
//! - Atomic batch writes for install-time provisioning
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::CacheStorage;
