//! Response type classification.
//!
//! A response is `basic` when its final URL (after redirects) shares the
//! scope's origin: scheme, host and port. Anything else read over HTTP is
//! `cors`.

use offcache_core::ResponseType;
use url::Url;

/// Classify a response by comparing its final URL with the agent's scope.
pub fn classify(scope: &Url, final_url: &Url) -> ResponseType {
    if scope.origin() == final_url.origin() { ResponseType::Basic } else { ResponseType::Cors }
}
