//! Store-provider interface consumed by the agent.
//!
//! The agent never touches SQLite directly; it receives an
//! `Arc<dyn CacheStorage>` so hosts can substitute another backend.

use async_trait::async_trait;

use super::connection::CacheDb;
use crate::Error;
use crate::request::RequestKey;
use crate::response::Response;

/// Named request→response stores.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if absent.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Store names in creation order.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a store; false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up a key across every store.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Look up a key in one store.
    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Write every entry or none.
    async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error>;

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error>;

    /// Evict oldest entries beyond `max_entries`, sparing `keep`.
    async fn trim(&self, name: &str, max_entries: usize, keep: &[RequestKey]) -> Result<u64, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.open_store(name).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.store_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_store(name).await
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        CacheDb::match_any(self, key).await
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.match_entry(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.put_entry(name, key, response).await
    }

    async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        self.put_entries(name, entries).await
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.entry_keys(name).await
    }

    async fn trim(&self, name: &str, max_entries: usize, keep: &[RequestKey]) -> Result<u64, Error> {
        self.trim_store(name, max_entries, keep).await
    }
}
