//! HTTP fetch pipeline backing the agent's `Network` seam.
//!
//! ### Request handling
//! - Method, headers and body are forwarded as given
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Response snapshot
//! - Bodies are buffered fully into `Bytes` before returning
//! - HTTP error statuses are responses, not errors
//! - Response type is `basic` for the scope's origin, `cors` otherwise

pub mod origin;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};
use url::Url;

pub use origin::classify;

use offcache_core::{AppConfig, Error, Network, Request, Response};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Scope whose origin marks responses as same-origin
    pub scope: Url,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            scope: Url::parse("http://localhost:8080/").expect("static scope URL"),
        }
    }
}

impl FetchConfig {
    /// Build fetch settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.scope)))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            scope,
            ..Default::default()
        })
    }
}

/// HTTP fetch client.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn send(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timeout: {}", e))
            } else {
                Error::Network(format!("network error: {}", e))
            }
        })?;

        if let Some(len) = response.content_length()
            && len > self.config.max_bytes as u64
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = header_pairs(response.headers());

        let bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "fetched {} {} -> {} ({}) in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(Response {
            response_type: classify(&self.config.scope, &final_url),
            url: final_url.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
        })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.send(request).await
    }
}

/// Header pairs in arrival order; values that are not valid UTF-8 are dropped.
fn header_pairs(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use offcache_core::{Agent, AgentSettings, CacheDb, ResponseType};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` as a 200 text/plain response to every connection.
    async fn serve(body: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while read < buf.len() {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn local_client(scope: &Url, max_bytes: usize) -> FetchClient {
        let config = FetchConfig { scope: scope.clone(), max_bytes, timeout: Duration::from_secs(5), ..Default::default() };
        FetchClient::new(config).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "offcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.scope.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig {
            scope: "https://example.github.io/memorial/".into(),
            timeout_ms: 1_500,
            ..Default::default()
        };
        let config = FetchConfig::from_app_config(&app).unwrap();
        assert_eq!(config.scope.host_str(), Some("example.github.io"));
        assert_eq!(config.timeout, Duration::from_millis(1_500));
    }

    #[test]
    fn test_header_pairs_skips_non_utf8() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html"));
        headers.insert(header::ETAG, header::HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        let pairs = header_pairs(&headers);
        assert_eq!(pairs, vec![("content-type".to_string(), "text/html".to_string())]);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let config = FetchConfig::default();
        let client = FetchClient::new(config);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = FetchConfig { timeout: Duration::from_secs(2), ..Default::default() };
        let client = FetchClient::new(config).unwrap();
        let request = Request::get(Url::parse("http://127.0.0.1:1/index.html").unwrap());

        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_fetch_buffers_same_origin_response() {
        let scope = serve(b"<html>program</html>").await;
        let client = local_client(&scope, 1024);

        let response = client.fetch(&Request::get(scope.join("program.html").unwrap())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.body, Bytes::from_static(b"<html>program</html>"));
        assert!(response.is_cacheable());
    }

    #[tokio::test]
    async fn test_response_from_other_origin_is_cors() {
        let server = serve(b"font").await;
        let client = local_client(&Url::parse("https://example.github.io/memorial/").unwrap(), 1024);

        let response = client.fetch(&Request::get(server.join("serif.woff2").unwrap())).await.unwrap();
        assert_eq!(response.response_type, ResponseType::Cors);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_body_over_limit_is_too_large() {
        let scope = serve(&[b'x'; 100]).await;
        let client = local_client(&scope, 10);

        let result = client.fetch(&Request::get(scope.join("photo.jpg").unwrap())).await;
        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
    }

    #[tokio::test]
    async fn test_oversized_response_does_not_fall_back_to_offline_page() {
        let scope = serve(&[b'x'; 100]).await;
        let db = CacheDb::open_in_memory().await.unwrap();
        let index = scope.join("index.html").unwrap();
        let cached = Response {
            url: index.to_string(),
            status: 200,
            status_text: "OK".into(),
            response_type: ResponseType::Basic,
            headers: vec![("content-type".into(), "text/html".into())],
            body: Bytes::from_static(b"<html>index</html>"),
        };
        db.put_entry("memorial-service-v1", &Request::get(index).key(), &cached)
            .await
            .unwrap();

        let settings = AgentSettings::new("memorial-service-v1", scope.clone(), &["./index.html"], "./index.html").unwrap();
        let agent = Agent::new(settings, Arc::new(db), Arc::new(local_client(&scope, 10)));

        let result = agent.handle_fetch(&Request::get(scope.join("photo.jpg").unwrap())).await;
        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let request = Request::new("BAD METHOD", Url::parse("http://127.0.0.1:1/").unwrap());

        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
