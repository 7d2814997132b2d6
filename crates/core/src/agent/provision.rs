//! Install handler: provision the current store with the manifest.

use futures::future::try_join_all;
use serde::Serialize;

use super::{Agent, ClientControl};
use crate::Error;
use crate::request::RequestKey;

/// What an install wrote.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub cache_name: String,
    /// Manifest URLs now stored, in manifest order.
    pub cached: Vec<String>,
}

impl Agent {
    /// Handle the install signal.
    ///
    /// Opens (or creates) the store named by the version identifier, fetches
    /// every manifest resource concurrently and writes them in one
    /// transaction. A single failed or non-2xx fetch fails the install with
    /// nothing written. On success the host is told to skip waiting.
    pub async fn install(&self, host: &dyn ClientControl) -> Result<InstallReport, Error> {
        let cache_name = &self.settings.cache_name;
        self.storage.open(cache_name).await?;

        let fetches = self.settings.manifest.iter().map(|request| async move {
            let url = request.url.to_string();
            let response = self
                .network
                .fetch(request)
                .await
                .map_err(|e| Error::ProvisionFailed { url: url.clone(), reason: e.to_string() })?;
            if !response.ok() {
                return Err(Error::ProvisionFailed { url, reason: format!("status {}", response.status) });
            }
            Ok::<_, Error>((request.key(), response))
        });

        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(cache_name = %cache_name, error = %e, "install failed");
                return Err(e);
            }
        };

        self.storage.put_all(cache_name, &entries).await?;
        host.skip_waiting();

        let cached: Vec<String> = entries.iter().map(|(key, _)| key.url.clone()).collect();
        tracing::info!(cache_name = %cache_name, entries = cached.len(), "installed");

        Ok(InstallReport { cache_name: cache_name.clone(), cached })
    }

    /// Manifest keys not present in the current store.
    pub async fn missing_manifest_entries(&self) -> Result<Vec<RequestKey>, Error> {
        let stored = self.storage.keys(&self.settings.cache_name).await?;
        Ok(self
            .settings
            .manifest_keys()
            .into_iter()
            .filter(|key| !stored.contains(key))
            .collect())
    }
}
