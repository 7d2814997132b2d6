//! Request descriptors and cache-key normalization.
//!
//! A cache key is the request method plus the normalized URL:
//! - Method upper-cased
//! - Host lower-cased, fragment removed
//! - Query string kept intact (not reordered)
//!
//! Manifest entries are relative paths (`./index.html`) resolved against the
//! agent's scope URL.

use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::hash::compute_cache_key;

/// An outgoing request from a controlled page.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    /// Create a request with the given method, upper-casing it.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url, headers: Vec::new(), body: Bytes::new() }
    }

    /// Shorthand for a GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Resolve `target` (relative path or absolute URL) against `scope` and
    /// build a request for it.
    pub fn resolve(method: &str, scope: &Url, target: &str) -> Result<Self, Error> {
        Ok(Self::new(method, resolve_url(scope, target)?))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// The normalized key this request is stored and matched under.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Normalized method + URL pair identifying a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url: normalize(url).to_string() }
    }

    /// Hex SHA-256 of the key, used as the storage primary key.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Normalize a URL for matching: drop the fragment and lower-case the host.
///
/// `url::Url` already lower-cases hosts for special schemes; the explicit
/// pass keeps the invariant for any scheme we accept.
pub fn normalize(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    if let Some(host) = url.host_str() {
        let lower = host.to_lowercase();
        if lower != host {
            let _ = normalized.set_host(Some(&lower));
        }
    }
    normalized
}

/// Resolve a manifest path or absolute URL against the scope.
pub fn resolve_url(scope: &Url, target: &str) -> Result<Url, Error> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    let url = scope
        .join(trimmed)
        .map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }
}
