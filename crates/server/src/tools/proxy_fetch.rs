//! proxy_fetch tool implementation.
//!
//! Sends one request through the active proxy version, exactly as the
//! application's own request would be intercepted.

use offcache_client::fetch::resolve;
use offcache_client::{Interception, LifecycleEvents, Method, ProxyRequest};
use offcache_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ProxyHost;
use crate::tools::json_result;

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// Absolute URL or application path (e.g. "/dashboard").
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional request body, sent as-is.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// URL the response was served from.
    pub response_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// One of cache, network, fallback, synthesized or bypass.
    pub source: String,
    /// Active cache store at the time of the request.
    pub cache_name: String,
    /// Response body, lossily decoded as UTF-8.
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the proxy_fetch tool.
pub async fn fetch_impl(host: &ProxyHost, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("unsupported method: {}", params.method)))?;

    let proxy = host.active().await;
    let url = resolve(&proxy.options().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let mut request = ProxyRequest::new(method, url.clone());
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let (response, source) = match proxy.intercept(request).await {
        Interception::Respond { response, source } => (response, source.as_str()),
        Interception::Bypass(request) => {
            tracing::debug!(%url, "bypassed, fetching natively");
            let response = host.network().fetch(request).await.map_err(Error::from)?;
            (response, "bypass")
        }
    };

    let output = ProxyFetchOutput {
        url: url.to_string(),
        response_url: response.url.to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        source: source.to_string(),
        cache_name: proxy.cache_name().to_string(),
        body: String::from_utf8_lossy(&response.body).to_string(),
        body_bytes: response.body.len(),
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{FakeNetwork, output, test_host};
    use std::sync::Arc;

    fn params(url: &str) -> ProxyFetchParams {
        ProxyFetchParams { url: url.into(), method: "GET".into(), body: None }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let host = test_host(Arc::new(FakeNetwork::site())).await;
        assert!(fetch_impl(&host, params("  ")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_bad_method() {
        let host = test_host(Arc::new(FakeNetwork::site())).await;
        let params = ProxyFetchParams { method: "NOT A METHOD".into(), ..params("/") };
        let err = fetch_impl(&host, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_fetch_precached_route_from_cache() {
        let network = Arc::new(FakeNetwork::site());
        let host = test_host(Arc::clone(&network)).await;

        let result = fetch_impl(&host, params("/dashboard")).await.unwrap();
        let out: ProxyFetchOutput = output(&result);

        assert_eq!(out.source, "cache");
        assert_eq!(out.status, 200);
        assert_eq!(out.url, "http://localhost:3000/dashboard");
        assert_eq!(out.body, "<html>/dashboard</html>");
        assert_eq!(out.cache_name, "histoscan-cache-v3");
    }

    #[tokio::test]
    async fn test_fetch_excluded_url_bypasses() {
        let network = Arc::new(FakeNetwork::site());
        let host = test_host(Arc::clone(&network)).await;
        let before = host.storage().entry_count("histoscan-cache-v3").await.unwrap();

        let result = fetch_impl(&host, params("https://histoscan.onrender.com/predict")).await.unwrap();
        let out: ProxyFetchOutput = output(&result);

        assert_eq!(out.source, "bypass");
        assert_eq!(out.status, 200);
        assert_eq!(host.storage().entry_count("histoscan-cache-v3").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_fetch_offline_falls_back_to_root() {
        let network = Arc::new(FakeNetwork::site());
        let host = test_host(Arc::clone(&network)).await;
        network.go_offline();

        let result = fetch_impl(&host, params("/about")).await.unwrap();
        let out: ProxyFetchOutput = output(&result);

        assert_eq!(out.source, "fallback");
        assert_eq!(out.response_url, "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_fetch_bypass_offline_is_network_error() {
        let network = Arc::new(FakeNetwork::site());
        let host = test_host(Arc::clone(&network)).await;
        network.go_offline();

        let err = fetch_impl(&host, params("/api/results")).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
        assert!(network.calls() > 0);
    }
}
