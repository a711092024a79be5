//! proxy_install and proxy_activate tool implementations.
//!
//! Deploying a new cache version is two steps, as in a browser: install
//! the new version next to the running one, then activate it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ProxyHost;
use crate::tools::json_result;

/// Parameters for the proxy_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProxyInstallParams {
    /// Cache version ordinal to install (default: the configured version).
    #[serde(default)]
    pub version: Option<u32>,
}

/// Implementation of the proxy_install tool.
pub async fn install_impl(host: &ProxyHost, params: ProxyInstallParams) -> Result<CallToolResult, McpError> {
    let report = host.install(params.version).await?;
    Ok(json_result(&report)?)
}

/// Implementation of the proxy_activate tool.
pub async fn activate_impl(host: &ProxyHost) -> Result<CallToolResult, McpError> {
    let report = host.activate().await?;
    Ok(json_result(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{FakeNetwork, output, test_host};
    use offcache_client::{ActivationReport, InstallReport};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_install_then_activate() {
        let host = test_host(Arc::new(FakeNetwork::site())).await;

        let result = install_impl(&host, ProxyInstallParams { version: Some(4) }).await.unwrap();
        let installed: InstallReport = output(&result);
        assert_eq!(installed.cache_name, "histoscan-cache-v4");
        assert_eq!(installed.cached.len(), 6);

        let result = activate_impl(&host).await.unwrap();
        let activated: ActivationReport = output(&result);
        assert_eq!(activated.deleted, vec!["histoscan-cache-v3"]);
    }

    #[tokio::test]
    async fn test_activate_nothing_waiting() {
        let host = test_host(Arc::new(FakeNetwork::site())).await;
        let err = activate_impl(&host).await.unwrap_err();
        assert_eq!(err.code.0, -32013);
    }
}
