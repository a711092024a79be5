//! cache_get tool implementation.
//!
//! Looks up an entry in the active cache store without touching the network.

use offcache_client::fetch::resolve;
use offcache_core::{Error, RequestKey};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ProxyHost;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or application path of the cached request.
    pub url: String,

    /// HTTP method of the cached request (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub cache_name: String,
    pub key: RequestKey,
    /// SHA-256 of the request identity.
    pub hash: String,
    /// URL the cached response was served from.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    /// Cached body, lossily decoded as UTF-8.
    pub body: String,
    pub body_bytes: usize,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(host: &ProxyHost, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let proxy = host.active().await;
    let url = resolve(&proxy.options().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = RequestKey::new(params.method.as_deref().unwrap_or("GET"), url.as_str());

    let entry = host
        .storage()
        .lookup(proxy.cache_name(), &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(key.to_string()))?;

    let output = CacheGetOutput {
        cache_name: proxy.cache_name().to_string(),
        hash: key.hash(),
        key,
        content_type: entry.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&entry.body).to_string(),
        body_bytes: entry.body.len(),
        url: entry.url,
        status: entry.status,
        headers: entry.headers,
        stored_at: entry.stored_at,
    };
    Ok(json_result(&output)?)
}
