//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::host::ProxyHost;
use crate::tools::cache::{get_impl, stores_impl};
use crate::tools::lifecycle::{activate_impl, install_impl};
use crate::tools::proxy_fetch::fetch_impl;
use crate::tools::{CacheGetParams, ProxyFetchParams, ProxyInstallParams};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    tool_router: ToolRouter<Self>,
    host: Arc<ProxyHost>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffcacheServer {
    /// Create a new server handler over a booted host.
    pub fn new(host: Arc<ProxyHost>) -> Self {
        Self { tool_router: Self::tool_router(), host }
    }

    /// Send a request through the active proxy version.
    #[tool(
        description = "Fetch a URL or application path through the offline cache proxy. Returns status, body and where the response came from (cache, network, fallback, synthesized or bypass)."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, params.0).await
    }

    /// Install a new cache version next to the active one.
    #[tool(
        description = "Install a cache version by pre-caching every tracked route. The new version waits until proxy_activate is called."
    )]
    async fn proxy_install(&self, params: Parameters<ProxyInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.host, params.0).await
    }

    #[tool(description = "Activate the waiting cache version and delete every stale cache store.")]
    async fn proxy_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.host).await
    }

    #[tool(description = "List cache stores with their entry counts and which one is active.")]
    async fn cache_stores(&self) -> Result<CallToolResult, McpError> {
        stores_impl(&self.host).await
    }

    /// Look up a cached entry without touching the network.
    #[tool(description = "Get a cached response from the active cache store. Returns CACHE_MISS if absent.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.host, params.0).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
