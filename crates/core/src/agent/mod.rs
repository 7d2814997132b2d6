//! The offline agent.
//!
//! Three handlers, one per lifecycle signal:
//! - `install` (provision.rs): fetch the manifest into the current store
//! - `activate` (reap.rs): delete stores from other versions, claim clients
//! - `handle_fetch` (intercept.rs): cache-first with network refresh and an
//!   offline fallback document
//!
//! Every handler is an async method the host awaits to completion. The only
//! work that outlives a handler is the background cache write after a
//! network fetch, surfaced as a `PendingWrite`.

mod intercept;
mod provision;
mod reap;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::config::AppConfig;
use crate::request::{Request, RequestKey};
use crate::response::Response;

pub use provision::InstallReport;
pub use reap::ActivateReport;

/// Network access consumed by the agent.
#[async_trait]
pub trait Network: Send + Sync {
    /// Issue the request. `Err` means no response arrived at all; HTTP error
    /// statuses are returned as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Page-client control offered by the host.
#[async_trait]
pub trait ClientControl: Send + Sync {
    /// Ask the host to activate the installed version without waiting for
    /// existing clients to close.
    fn skip_waiting(&self);

    /// Take control of every open client. Returns how many were claimed.
    async fn claim(&self) -> Result<usize, Error>;
}

/// Where the response handed to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Not intercepted; default network handling.
    PassThrough,
    CacheHit,
    /// Fetched and returned without caching.
    Network,
    /// Fetched and queued for caching.
    NetworkStored,
    /// Network failed; the offline document was served instead.
    OfflineFallback,
}

/// Handle to a background cache write.
///
/// Dropping it detaches the write; awaiting `finished` keeps the caller
/// alive until the entry is persisted.
#[derive(Debug)]
pub struct PendingWrite(JoinHandle<()>);

impl PendingWrite {
    pub async fn finished(self) {
        if let Err(e) = self.0.await {
            tracing::warn!(error = %e, "background cache write aborted");
        }
    }
}

/// A response ready for the page, plus any write still in flight.
#[derive(Debug)]
pub struct Fetched {
    pub response: Response,
    pub source: ResponseSource,
    pub write: Option<PendingWrite>,
}

impl Fetched {
    pub(crate) fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source, write: None }
    }

    /// Wait for the background write, if any, and return the response.
    pub async fn settle(mut self) -> (Response, ResponseSource) {
        if let Some(write) = self.write.take() {
            write.finished().await;
        }
        (self.response, self.source)
    }
}

/// Outcome of the fetch handler.
#[derive(Debug)]
pub enum Interception {
    /// The agent declined; the host must perform the request itself.
    PassThrough,
    Respond(Fetched),
}

/// Resolved agent settings.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Version identifier; also the name of the current store.
    pub cache_name: String,
    pub scope: Url,
    /// Manifest resources as GET requests, in manifest order.
    pub manifest: Vec<Request>,
    pub offline_page: Request,
    pub max_entries: Option<usize>,
}

impl AgentSettings {
    /// Resolve manifest and offline page paths against `scope`.
    pub fn new(cache_name: &str, scope: Url, manifest: &[&str], offline_page: &str) -> Result<Self, Error> {
        let manifest = manifest
            .iter()
            .map(|path| Request::resolve("GET", &scope, path))
            .collect::<Result<Vec<_>, _>>()?;
        let offline_page = Request::resolve("GET", &scope, offline_page)?;
        Ok(Self { cache_name: cache_name.to_string(), scope, manifest, offline_page, max_entries: None })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.scope)))?;
        let manifest: Vec<&str> = config.manifest.iter().map(String::as_str).collect();
        let mut settings = Self::new(&config.cache_name, scope, &manifest, &config.offline_page)?;
        settings.max_entries = config.max_entries;
        Ok(settings)
    }

    pub fn manifest_keys(&self) -> Vec<RequestKey> {
        self.manifest.iter().map(Request::key).collect()
    }
}

/// The offline agent for one version identifier.
#[derive(Clone)]
pub struct Agent {
    settings: Arc<AgentSettings>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl Agent {
    pub fn new(settings: AgentSettings, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { settings: Arc::new(settings), storage, network }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn cache_name(&self) -> &str {
        &self.settings.cache_name
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-crate fakes for the network and the host.

    use super::*;
    use crate::response::ResponseType;
    use bytes::Bytes;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub const SCOPE: &str = "https://example.github.io/memorial/";
    pub const MANIFEST: &[&str] = &["./", "./index.html", "./manifest.json"];

    pub fn url(path: &str) -> Url {
        Url::parse(SCOPE).unwrap().join(path).unwrap()
    }

    pub fn response(url: &str, status: u16, response_type: ResponseType, body: &str) -> Response {
        Response {
            url: url.to_string(),
            status,
            status_text: String::new(),
            response_type,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn settings(cache_name: &str) -> AgentSettings {
        AgentSettings::new(cache_name, Url::parse(SCOPE).unwrap(), MANIFEST, "./index.html").unwrap()
    }

    /// Routes by normalized URL; unknown URLs answer 404.
    #[derive(Default)]
    pub struct FakeNetwork {
        routes: Mutex<HashMap<String, Response>>,
        too_large: Mutex<HashSet<String>>,
        offline: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeNetwork {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// A network serving every manifest resource as a same-origin 200.
        pub fn serving_manifest() -> Arc<Self> {
            let network = Self::new();
            for path in MANIFEST {
                let url = url(path);
                network.route(url.as_str(), response(url.as_str(), 200, ResponseType::Basic, path));
            }
            network
        }

        pub fn route(&self, url: &str, response: Response) {
            self.routes.lock().unwrap().insert(url.to_string(), response);
        }

        /// Answer `url` with a body over the size limit.
        pub fn route_too_large(&self, url: &str) {
            self.too_large.lock().unwrap().insert(url.to_string());
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_for(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            let key = request.key();
            self.calls.lock().unwrap().push(key.url.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            if self.too_large.lock().unwrap().contains(&key.url) {
                return Err(Error::FetchTooLarge(format!("{} exceeds limit", key.url)));
            }
            let routed = self.routes.lock().unwrap().get(&key.url).cloned();
            Ok(routed.unwrap_or_else(|| response(&key.url, 404, ResponseType::Basic, "not found")))
        }
    }

    #[derive(Default)]
    pub struct FakeHost {
        pub skipped_waiting: AtomicBool,
        pub claims: AtomicUsize,
    }

    #[async_trait]
    impl ClientControl for FakeHost {
        fn skip_waiting(&self) {
            self.skipped_waiting.store(true, Ordering::SeqCst);
        }

        async fn claim(&self) -> Result<usize, Error> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }
}
