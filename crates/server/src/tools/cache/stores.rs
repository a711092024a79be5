//! cache_stores tool implementation.
//!
//! Lists every cache store with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ProxyHost;
use crate::tools::json_result;

/// One cache store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoreInfo {
    pub name: String,
    pub entries: usize,
    /// True for the store of the active proxy version.
    pub active: bool,
}

/// Output from the cache_stores tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStoresOutput {
    /// Lifecycle state of the active proxy version.
    pub state: String,
    pub stores: Vec<CacheStoreInfo>,
}

/// Implementation of the cache_stores tool.
pub async fn stores_impl(host: &ProxyHost) -> Result<CallToolResult, McpError> {
    let proxy = host.active().await;
    let storage = host.storage();

    let mut stores = Vec::new();
    for name in storage.names().await? {
        let entries = storage.entry_count(&name).await?;
        stores.push(CacheStoreInfo { active: name == proxy.cache_name(), name, entries });
    }

    let output = CacheStoresOutput { state: proxy.state().await.to_string(), stores };
    Ok(json_result(&output)?)
}
