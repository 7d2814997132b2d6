//! Fetch handler: cache first, then network, then the offline document.

use super::{Agent, Fetched, Interception, PendingWrite, ResponseSource};
use crate::Error;
use crate::request::{Request, RequestKey};
use crate::response::Response;

impl Agent {
    /// Handle one request from a controlled page.
    ///
    /// Non-GET requests pass through. A cached entry in any store is returned
    /// as is. On a miss the request goes to the network: cacheable responses
    /// are written to the current store in the background, everything else is
    /// returned untouched. If the network is unreachable the offline document
    /// is served; if that is missing too, `Error::OfflineUnavailable`. Other
    /// fetch errors, such as an oversized body, are returned as is.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Interception, Error> {
        if !request.is_get() {
            tracing::debug!(method = %request.method, url = %request.url, "pass-through");
            return Ok(Interception::PassThrough);
        }

        let key = request.key();
        match self.storage.match_any(&key).await {
            Ok(Some(cached)) => {
                tracing::debug!(url = %key.url, "cache hit");
                return Ok(Interception::Respond(Fetched::new(cached, ResponseSource::CacheHit)));
            }
            Ok(None) => tracing::debug!(url = %key.url, "cache miss"),
            Err(e) => tracing::warn!(url = %key.url, error = %e, "cache lookup failed, treating as miss"),
        }

        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e @ Error::Network(_)) => return self.offline_fallback(&key, e).await.map(Interception::Respond),
            Err(e) => return Err(e),
        };

        if !response.is_cacheable() {
            tracing::debug!(
                url = %key.url,
                status = response.status,
                response_type = %response.response_type,
                "not caching response"
            );
            return Ok(Interception::Respond(Fetched::new(response, ResponseSource::Network)));
        }

        let write = self.store_in_background(key, response.clone());
        Ok(Interception::Respond(Fetched { response, source: ResponseSource::NetworkStored, write: Some(write) }))
    }

    async fn offline_fallback(&self, key: &RequestKey, cause: Error) -> Result<Fetched, Error> {
        tracing::debug!(url = %key.url, error = %cause, "network failed, serving offline document");

        let offline_key = self.settings.offline_page.key();
        match self.storage.match_any(&offline_key).await {
            Ok(Some(page)) => Ok(Fetched::new(page, ResponseSource::OfflineFallback)),
            Ok(None) => Err(Error::OfflineUnavailable(format!("{} ({cause})", key.url))),
            Err(e) => Err(Error::OfflineUnavailable(format!("{} ({cause}; {e})", key.url))),
        }
    }

    /// Persist `response` under `key` in the current store without making
    /// the caller wait. The caller's copy and this one share one body buffer.
    fn store_in_background(&self, key: RequestKey, response: Response) -> PendingWrite {
        let storage = self.storage.clone();
        let cache_name = self.settings.cache_name.clone();
        let max_entries = self.settings.max_entries;
        let keep = self.settings.manifest_keys();

        PendingWrite(tokio::spawn(async move {
            if let Err(e) = storage.put(&cache_name, &key, &response).await {
                tracing::warn!(url = %key.url, error = %e, "failed to cache response");
                return;
            }
            tracing::debug!(url = %key.url, cache_name = %cache_name, "cached response");

            if let Some(max) = max_entries {
                match storage.trim(&cache_name, max, &keep).await {
                    Ok(0) => {}
                    Ok(evicted) => tracing::debug!(cache_name = %cache_name, evicted, "trimmed cache store"),
                    Err(e) => tracing::warn!(cache_name = %cache_name, error = %e, "failed to trim cache store"),
                }
            }
        }))
    }
}
