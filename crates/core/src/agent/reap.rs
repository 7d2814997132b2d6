//! Activate handler: reap stores left behind by other versions.

use futures::future::join_all;
use serde::Serialize;

use super::{Agent, ClientControl};
use crate::Error;

/// What an activation removed and claimed.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub cache_name: String,
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed; retried on the next activation.
    pub failed: Vec<String>,
    pub claimed: usize,
}

impl Agent {
    /// Handle the activate signal.
    ///
    /// Deletes every store not named by the version identifier, concurrently,
    /// and waits for the whole batch. One failed deletion does not stop the
    /// others. Then claims all open clients.
    pub async fn activate(&self, host: &dyn ClientControl) -> Result<ActivateReport, Error> {
        let cache_name = &self.settings.cache_name;
        let stale: Vec<String> = self
            .storage
            .names()
            .await?
            .into_iter()
            .filter(|name| name != cache_name)
            .collect();

        let results = join_all(stale.iter().map(|name| async move { (name, self.storage.delete(name).await) })).await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in results {
            match result {
                Ok(_) => {
                    tracing::debug!(store = %name, "deleted stale cache store");
                    deleted.push(name.clone());
                }
                Err(e) => {
                    tracing::warn!(store = %name, error = %e, "failed to delete stale cache store");
                    failed.push(name.clone());
                }
            }
        }

        let claimed = match host.claim().await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!(error = %e, "failed to claim clients");
                0
            }
        };

        tracing::info!(cache_name = %cache_name, deleted = deleted.len(), claimed, "activated");

        Ok(ActivateReport { cache_name: cache_name.clone(), deleted, failed, claimed })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::cache::{CacheDb, CacheStorage};
    use crate::request::RequestKey;
    use crate::response::Response;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    /// Delegates to a `CacheDb` but refuses to delete one store.
    struct StubbornStorage {
        inner: CacheDb,
        undeletable: &'static str,
    }

    #[async_trait]
    impl CacheStorage for StubbornStorage {
        async fn open(&self, name: &str) -> Result<(), Error> {
            CacheStorage::open(&self.inner, name).await
        }

        async fn names(&self) -> Result<Vec<String>, Error> {
            self.inner.names().await
        }

        async fn delete(&self, name: &str) -> Result<bool, Error> {
            if name == self.undeletable {
                return Err(Error::InvalidInput(format!("{name} is locked")));
            }
            self.inner.delete(name).await
        }

        async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
            CacheStorage::match_any(&self.inner, key).await
        }

        async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
            self.inner.match_in(name, key).await
        }

        async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
            self.inner.put(name, key, response).await
        }

        async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
            self.inner.put_all(name, entries).await
        }

        async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
            self.inner.keys(name).await
        }

        async fn trim(&self, name: &str, max_entries: usize, keep: &[RequestKey]) -> Result<u64, Error> {
            self.inner.trim(name, max_entries, keep).await
        }
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_stores() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("memorial-service-v0").await.unwrap();
        db.open_store("memorial-service-v1").await.unwrap();
        let agent = Agent::new(settings("memorial-service-v1"), Arc::new(db.clone()), FakeNetwork::new());
        let host = FakeHost::default();

        let report = agent.activate(&host).await.unwrap();
        assert_eq!(report.deleted, vec!["memorial-service-v0"]);
        assert!(report.failed.is_empty());
        assert_eq!(report.claimed, 1);
        assert_eq!(host.claims.load(Ordering::SeqCst), 1);
        assert_eq!(db.store_names().await.unwrap(), vec!["memorial-service-v1"]);
    }

    #[tokio::test]
    async fn test_activate_without_stale_stores() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let agent = Agent::new(settings("memorial-service-v1"), Arc::new(db.clone()), FakeNetwork::new());

        let report = agent.activate(&FakeHost::default()).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(db.store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_deletion_does_not_block_others() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["legacy-a", "legacy-b", "legacy-c", "memorial-service-v1"] {
            db.open_store(name).await.unwrap();
        }
        let storage = StubbornStorage { inner: db.clone(), undeletable: "legacy-b" };
        let agent = Agent::new(settings("memorial-service-v1"), Arc::new(storage), FakeNetwork::new());
        let host = FakeHost::default();

        let report = agent.activate(&host).await.unwrap();
        assert_eq!(report.deleted, vec!["legacy-a", "legacy-c"]);
        assert_eq!(report.failed, vec!["legacy-b"]);
        assert_eq!(host.claims.load(Ordering::SeqCst), 1);
        assert_eq!(db.store_names().await.unwrap(), vec!["legacy-b", "memorial-service-v1"]);
    }

    #[tokio::test]
    async fn test_version_rollover() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = FakeNetwork::serving_manifest();
        let only_old = url("./hymns.html");
        network.route(only_old.as_str(), response(only_old.as_str(), 200, crate::ResponseType::Basic, "hymns"));

        let v1 = Agent::new(settings("memorial-service-v1"), Arc::new(db.clone()), network.clone());
        v1.install(&FakeHost::default()).await.unwrap();
        v1.activate(&FakeHost::default()).await.unwrap();
        let request = crate::Request::get(only_old);
        if let super::super::Interception::Respond(fetched) = v1.handle_fetch(&request).await.unwrap() {
            fetched.settle().await;
        }
        assert!(db.match_any(&request.key()).await.unwrap().is_some());

        let v2 = Agent::new(settings("memorial-service-v2"), Arc::new(db.clone()), network);
        v2.install(&FakeHost::default()).await.unwrap();
        let report = v2.activate(&FakeHost::default()).await.unwrap();

        assert_eq!(report.deleted, vec!["memorial-service-v1"]);
        assert_eq!(db.store_names().await.unwrap(), vec!["memorial-service-v2"]);
        assert!(db.match_any(&request.key()).await.unwrap().is_none());
    }
}
