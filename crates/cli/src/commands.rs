//! One function per subcommand.
//!
//! Every invocation builds a fresh proxy version over the shared store, so
//! lifecycle progress is carried between runs by the stores themselves.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use offcache_client::fetch::resolve;
use offcache_client::{
    ActivationReport, InstallReport, Interception, LifecycleEvents, Method, Network, OfflineProxy, ProxyOptions,
    ProxyRequest,
};
use offcache_core::{CacheStorage, Error};
use serde::Serialize;

/// Handles shared by all commands.
pub struct Context {
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub options: ProxyOptions,
}

impl Context {
    fn proxy(&self) -> OfflineProxy {
        OfflineProxy::new(Arc::clone(&self.storage), Arc::clone(&self.network), self.options.clone())
    }
}

#[derive(Debug, Serialize)]
pub struct FetchOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub source: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct StoreLine {
    pub name: String,
    pub entries: usize,
    pub current: bool,
}

pub async fn install(ctx: &Context) -> Result<InstallReport> {
    let report = ctx.proxy().install().await?;
    if report.cached.is_empty() {
        tracing::warn!(cache = %report.cache_name, "no route could be cached");
    }
    Ok(report)
}

pub async fn activate(ctx: &Context) -> Result<ActivationReport> {
    let proxy = ctx.proxy();
    proxy
        .adopt()
        .await
        .with_context(|| format!("run `offcache install` for {} first", proxy.cache_name()))?;
    Ok(proxy.activate().await?)
}

pub async fn fetch(ctx: &Context, url: &str, method: &str) -> Result<FetchOutput> {
    let Ok(method) = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()) else {
        bail!("unsupported method: {method}");
    };
    let url = resolve(&ctx.options.origin, url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let proxy = ctx.proxy();
    if let Err(e) = proxy.resume().await {
        tracing::warn!(error = %e, "version not activated, fetching without the proxy");
    }

    let (response, source) = match proxy.intercept(ProxyRequest::new(method, url)).await {
        Interception::Respond { response, source } => (response, source.as_str()),
        Interception::Bypass(request) => (ctx.network.fetch(request).await.map_err(Error::from)?, "bypass"),
    };
    proxy.flush().await;

    Ok(FetchOutput {
        url: response.url.to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        source: source.to_string(),
        body: String::from_utf8_lossy(&response.body).to_string(),
    })
}

pub async fn stores(ctx: &Context) -> Result<Vec<StoreLine>> {
    let current = ctx.options.cache_name.to_string();
    let mut lines = Vec::new();
    for name in ctx.storage.names().await? {
        let entries = ctx.storage.entry_count(&name).await?;
        lines.push(StoreLine { current: name == current, name, entries });
    }
    Ok(lines)
}
