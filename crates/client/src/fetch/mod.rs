//! Network layer for the proxy.
//!
//! ### Requests and responses
//! - `ProxyRequest` is cheap to clone, so the proxy can hand a duplicate to
//!   the network and keep the original.
//! - `ProxyResponse` carries a `ResponseKind` mirroring browser response
//!   types: only `Basic` responses with status 200 are cacheable.
//!
//! ### Transport
//! - `Network` is the seam the proxy fetches through.
//! - `FetchClient` implements it with reqwest (rustls, bounded redirects,
//!   transport timeout).

pub mod error;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, resolve, same_origin};
pub use error::NetworkError;

use offcache_core::{AppConfig, CachedResponse, Error, RequestKey};

/// Body of the response synthesized when neither network nor cache can answer.
pub const NETWORK_ERROR_BODY: &str = "Network error occurred";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Application origin; responses from elsewhere are classified `Cors`.
    pub origin: Url,

    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn new(origin: Url) -> Self {
        Self { origin, user_agent: "offcache/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }

    /// Build from the loaded application config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            origin,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        })
    }
}

/// An outgoing request intercepted by the proxy.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Identity used as the cache key.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }
}

/// Browser-style classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Same origin as the application, served from the requested URL.
    Basic,
    /// Served from a different origin.
    Cors,
    /// Same origin, but reached through one or more redirects.
    Redirected,
    /// Built locally, never touched the network.
    Synthetic,
}

/// Classify a response by where it ended up relative to the app origin.
pub fn classify(origin: &Url, requested: &Url, final_url: &Url) -> ResponseKind {
    if !same_origin(origin, final_url) {
        ResponseKind::Cors
    } else if requested != final_url {
        ResponseKind::Redirected
    } else {
        ResponseKind::Basic
    }
}

/// A response handed back to the application.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// URL the response was served from.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl ProxyResponse {
    /// Same-origin 200 responses are the only ones written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.kind == ResponseKind::Basic && self.status == StatusCode::OK
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Minimal `408 Request Timeout` plain-text response for `url`.
    pub fn network_error(url: Url) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Self {
            url,
            status: StatusCode::REQUEST_TIMEOUT,
            headers,
            body: Bytes::from_static(NETWORK_ERROR_BODY.as_bytes()),
            kind: ResponseKind::Synthetic,
        }
    }

    /// Capture a copy for storage. Header values that aren't visible ASCII
    /// are dropped.
    pub fn to_cached(&self) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        CachedResponse {
            url: self.url.to_string(),
            status: self.status.as_u16(),
            headers,
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored entry.
    pub fn from_cached(cached: CachedResponse) -> Result<Self, Error> {
        let url = Url::parse(&cached.url).map_err(|e| Error::CorruptEntry(format!("url {}: {e}", cached.url)))?;
        let status = StatusCode::from_u16(cached.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", cached.status)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &cached.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name {name}: {e}")))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| Error::CorruptEntry(format!("header value {value}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, headers, body: Bytes::from(cached.body), kind: ResponseKind::Basic })
    }
}

/// The transport the proxy fetches through.
#[async_trait]
pub trait Network: Send + Sync {
    /// Issue a request. `Err` means no response arrived at all.
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, NetworkError>;
}

/// HTTP fetch client backed by reqwest.
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
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, NetworkError> {
        let start = Instant::now();
        let ProxyRequest { method, url, headers, body } = request;

        let mut builder = self.http.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Body(e.to_string()))?;

        let kind = classify(&self.config.origin, &url, &final_url);

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes, {:?})",
            method,
            url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len(),
            kind
        );

        Ok(ProxyResponse { url: final_url, status, headers, body, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    fn html_response(url: &str, status: StatusCode, kind: ResponseKind) -> ProxyResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        ProxyResponse { url: Url::parse(url).unwrap(), status, headers, body: Bytes::from_static(b"<html/>"), kind }
    }

    #[test]
    fn test_fetch_config_new() {
        let config = FetchConfig::new(origin());
        assert_eq!(config.user_agent, "offcache/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from_app_config(&app).unwrap();
        assert_eq!(config.origin.as_str(), "http://localhost:3000/");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_classify() {
        let requested = Url::parse("http://localhost:3000/login").unwrap();
        assert_eq!(classify(&origin(), &requested, &requested), ResponseKind::Basic);

        let moved = Url::parse("http://localhost:3000/dashboard").unwrap();
        assert_eq!(classify(&origin(), &requested, &moved), ResponseKind::Redirected);

        let cdn = Url::parse("https://cdn.example.com/app.js").unwrap();
        assert_eq!(classify(&origin(), &cdn, &cdn), ResponseKind::Cors);
    }

    #[test]
    fn test_is_cacheable() {
        assert!(html_response("http://localhost:3000/", StatusCode::OK, ResponseKind::Basic).is_cacheable());
        assert!(!html_response("http://localhost:3000/", StatusCode::NOT_FOUND, ResponseKind::Basic).is_cacheable());
        assert!(!html_response("http://localhost:3000/", StatusCode::OK, ResponseKind::Redirected).is_cacheable());
        assert!(!html_response("https://cdn.example.com/", StatusCode::OK, ResponseKind::Cors).is_cacheable());
        assert!(!ProxyResponse::network_error(origin()).is_cacheable());
    }

    #[test]
    fn test_network_error_response() {
        let response = ProxyResponse::network_error(origin());
        assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(&response.body[..], NETWORK_ERROR_BODY.as_bytes());
    }

    #[test]
    fn test_cached_roundtrip_keeps_headers() {
        let response = html_response("http://localhost:3000/history", StatusCode::OK, ResponseKind::Basic);
        let restored = ProxyResponse::from_cached(response.to_cached()).unwrap();
        assert_eq!(restored.url, response.url);
        assert_eq!(restored.status, StatusCode::OK);
        assert_eq!(restored.content_type(), Some("text/html"));
        assert_eq!(restored.body, response.body);
    }

    #[test]
    fn test_from_cached_rejects_bad_status() {
        let mut cached =
            html_response("http://localhost:3000/", StatusCode::OK, ResponseKind::Basic).to_cached();
        cached.status = 42;
        assert!(matches!(ProxyResponse::from_cached(cached), Err(Error::CorruptEntry(_))));
    }

    #[test]
    fn test_request_key() {
        let request = ProxyRequest::new(Method::POST, Url::parse("http://localhost:3000/upload").unwrap())
            .with_body("payload");
        let key = request.key();
        assert_eq!(key.method, "POST");
        assert_eq!(key.url, "http://localhost:3000/upload");
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::new(origin()));
        assert!(client.is_ok());
    }
}
