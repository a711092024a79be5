//! The offline cache proxy.
//!
//! One `OfflineProxy` is one deployed version. It owns a versioned cache
//! store name, the tracked routes and the exclusion predicate, and reaches
//! storage and network only through the handles injected at construction.
//!
//! ### Lifecycle
//! - `install`: open the store, pre-cache every tracked route concurrently.
//!   Each route is best effort; the event only fails if the store can't be
//!   opened.
//! - `activate`: record this version as the activated one, then delete
//!   every store not named for it.
//! - `intercept`: cache-first for everything the exclusion predicate lets
//!   through, network on a miss, cached root or a synthesized 408 when the
//!   network is gone.
//! - `terminate`: stop intercepting.
//!
//! ### Background writes
//! Cacheable network responses are returned immediately; the copy is stored
//! by a spawned task. `flush` waits for those tasks.

mod report;
mod state;

pub use report::{ActivationReport, InstallReport, Interception, ResponseSource, RouteFailure};
pub use state::ProxyState;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use offcache_core::routes::FALLBACK_ROUTE;
use offcache_core::{
    AppConfig, CacheName, CacheStorage, CachedResponse, Error, ExclusionPredicate, RequestKey, TrackedRoutes,
};

use crate::fetch::{Network, ProxyRequest, ProxyResponse, resolve};

/// Deploy-time settings of one proxy version.
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub origin: Url,
    pub cache_name: CacheName,
    pub routes: TrackedRoutes,
    pub exclusions: ExclusionPredicate,
}

impl ProxyOptions {
    /// Default cache name, routes and exclusions for `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            cache_name: CacheName::default(),
            routes: TrackedRoutes::default(),
            exclusions: ExclusionPredicate::default(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            origin,
            cache_name: config.cache_name(),
            routes: config.tracked_routes(),
            exclusions: config.exclusion_predicate(),
        })
    }
}

/// Host-dispatched events, one method per event type.
#[async_trait]
pub trait LifecycleEvents: Send + Sync {
    /// Open the versioned store and pre-cache the tracked routes.
    async fn install(&self) -> Result<InstallReport, Error>;

    /// Take over from older versions, purging their stores.
    async fn activate(&self) -> Result<ActivationReport, Error>;

    /// Decide how to answer one outgoing request.
    async fn intercept(&self, request: ProxyRequest) -> Interception;

    /// Superseded by a newer version; stop intercepting.
    async fn terminate(&self);
}

/// Versioned offline cache proxy.
pub struct OfflineProxy {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    options: ProxyOptions,
    cache_name: String,
    state: RwLock<ProxyState>,
    pending: Mutex<JoinSet<()>>,
}

impl OfflineProxy {
    /// Create a proxy version in the `Installing` state.
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, options: ProxyOptions) -> Self {
        let cache_name = options.cache_name.to_string();
        Self {
            storage,
            network,
            options,
            cache_name,
            state: RwLock::new(ProxyState::Installing),
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Name of this version's cache store.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub async fn state(&self) -> ProxyState {
        self.state.read().await.clone()
    }

    /// Resume the version that an earlier run activated, skipping install
    /// and activate.
    ///
    /// # Errors
    ///
    /// `InvalidState` if this proxy already left `Installing`, or its store
    /// does not exist or was never activated. An installed store that was
    /// never activated must go through [`OfflineProxy::adopt`] and
    /// `activate` so stale stores get purged.
    pub async fn resume(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        self.require_installed_store(&state, "resume").await?;
        let activated = self.storage.active_store().await?;
        if activated.as_deref() != Some(self.cache_name.as_str()) {
            return Err(Error::InvalidState(format!("cache {} was never activated", self.cache_name)));
        }
        *state = ProxyState::Active { cache_name: self.cache_name.clone() };
        tracing::info!(cache = %self.cache_name, "resumed active cache");
        Ok(())
    }

    /// Take over a store installed by an earlier run without pre-caching
    /// again, leaving this version `Installed` and ready to activate.
    ///
    /// # Errors
    ///
    /// `InvalidState` if this proxy already left `Installing` or its store
    /// does not exist.
    pub async fn adopt(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        self.require_installed_store(&state, "adopt").await?;
        *state = ProxyState::Installed;
        tracing::info!(cache = %self.cache_name, "adopted installed cache");
        Ok(())
    }

    async fn require_installed_store(&self, state: &ProxyState, event: &str) -> Result<(), Error> {
        if *state != ProxyState::Installing {
            return Err(Error::InvalidState(format!("cannot {event} while {state}")));
        }
        let names = self.storage.names().await?;
        if !names.iter().any(|n| *n == self.cache_name) {
            return Err(Error::InvalidState(format!("cache {} is not installed", self.cache_name)));
        }
        Ok(())
    }

    /// Mark this version's store as the activated one and return every
    /// store name seen at that point.
    async fn record_activation(&self) -> Result<Vec<String>, Error> {
        let names = self.storage.names().await?;
        self.storage.mark_active(&self.cache_name).await?;
        Ok(names)
    }

    /// Wait for every pending background cache write to finish.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "cache write task did not complete");
            }
        }
    }

    async fn store_in_background(&self, key: RequestKey, cached: CachedResponse) {
        let storage = Arc::clone(&self.storage);
        let cache_name = self.cache_name.clone();
        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match storage.put(&cache_name, &key, &cached).await {
                Ok(()) => tracing::debug!(%key, "cached response"),
                Err(e) => tracing::error!(%key, error = %e, "failed to cache response"),
            }
        });
    }

    /// Serve the cached root route, or synthesize a 408.
    async fn fallback(&self, url: Url) -> Interception {
        match resolve(&self.options.origin, FALLBACK_ROUTE) {
            Ok(root) => {
                let key = RequestKey::get(root.as_str());
                match self.storage.lookup(&self.cache_name, &key).await {
                    Ok(Some(cached)) => match ProxyResponse::from_cached(cached) {
                        Ok(response) => {
                            tracing::info!(%url, "network unavailable, serving cached root");
                            return Interception::Respond { response, source: ResponseSource::Fallback };
                        }
                        Err(e) => tracing::warn!(error = %e, "unreadable fallback entry"),
                    },
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "fallback lookup failed"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "cannot resolve fallback route"),
        }

        tracing::info!(%url, "network unavailable, no fallback cached");
        Interception::Respond { response: ProxyResponse::network_error(url), source: ResponseSource::Synthesized }
    }
}

/// Fetch one tracked route and store it.
async fn precache(
    storage: &dyn CacheStorage, network: &dyn Network, origin: &Url, cache_name: &str, route: &str,
) -> Result<(), Error> {
    let url = resolve(origin, route).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = ProxyRequest::get(url);
    let key = request.key();

    let response = network.fetch(request).await?;
    if !response.status.is_success() {
        return Err(Error::Network(format!("unexpected status {}", response.status.as_u16())));
    }

    storage.put(cache_name, &key, &response.to_cached()).await
}

#[async_trait]
impl LifecycleEvents for OfflineProxy {
    async fn install(&self) -> Result<InstallReport, Error> {
        {
            let state = self.state.read().await;
            if *state != ProxyState::Installing {
                return Err(Error::InvalidState(format!("cannot install while {state}")));
            }
        }

        self.storage.open(&self.cache_name).await?;
        tracing::info!(cache = %self.cache_name, "opened cache");

        let mut tasks = JoinSet::new();
        for route in self.options.routes.iter() {
            let route = route.to_string();
            let storage = Arc::clone(&self.storage);
            let network = Arc::clone(&self.network);
            let origin = self.options.origin.clone();
            let cache_name = self.cache_name.clone();
            tasks.spawn(async move {
                let outcome = precache(storage.as_ref(), network.as_ref(), &origin, &cache_name, &route).await;
                (route, outcome)
            });
        }

        let mut report = InstallReport { cache_name: self.cache_name.clone(), ..Default::default() };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((route, Ok(()))) => report.cached.push(route),
                Ok((route, Err(e))) => {
                    tracing::error!(%route, error = %e, "failed to cache route");
                    report.failed.push(RouteFailure { route, reason: e.to_string() });
                }
                Err(e) => tracing::error!(error = %e, "pre-cache task did not complete"),
            }
        }

        let routes = &self.options.routes;
        report.cached.sort_by_key(|r| routes.position(r));
        report.failed.sort_by_key(|f| routes.position(&f.route));

        *self.state.write().await = ProxyState::Installed;
        tracing::info!(
            cache = %self.cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );

        Ok(report)
    }

    async fn activate(&self) -> Result<ActivationReport, Error> {
        {
            let mut state = self.state.write().await;
            if *state != ProxyState::Installed {
                return Err(Error::InvalidState(format!("cannot activate while {state}")));
            }
            *state = ProxyState::Activating;
        }

        let names = match self.record_activation().await {
            Ok(names) => names,
            Err(e) => {
                *self.state.write().await = ProxyState::Installed;
                return Err(e);
            }
        };

        let mut report = ActivationReport { cache_name: self.cache_name.clone(), ..Default::default() };
        for name in names.into_iter().filter(|n| *n != self.cache_name) {
            match self.storage.delete(&name).await {
                Ok(true) => {
                    tracing::info!(cache = %name, "deleted stale cache");
                    report.deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(cache = %name, error = %e, "failed to delete stale cache");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        *self.state.write().await = ProxyState::Active { cache_name: self.cache_name.clone() };
        tracing::info!(cache = %self.cache_name, deleted = report.deleted.len(), "activated");

        Ok(report)
    }

    async fn intercept(&self, request: ProxyRequest) -> Interception {
        if !self.state.read().await.is_active() {
            tracing::trace!(url = %request.url, "proxy not active, bypassing");
            return Interception::Bypass(request);
        }

        if let Some(marker) = self.options.exclusions.matching_marker(request.url.as_str()) {
            tracing::debug!(url = %request.url, marker, "excluded from cache");
            return Interception::Bypass(request);
        }

        let key = request.key();
        match self.storage.lookup(&self.cache_name, &key).await {
            Ok(Some(cached)) => match ProxyResponse::from_cached(cached) {
                Ok(response) => {
                    tracing::debug!(%key, "cache hit");
                    return Interception::Respond { response, source: ResponseSource::Cache };
                }
                Err(e) => tracing::warn!(%key, error = %e, "unreadable cache entry, fetching"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, error = %e, "cache lookup failed, fetching"),
        }

        let url = request.url.clone();
        let method = request.method.clone();
        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%url, error = %e, "fetch failed");
                return self.fallback(url).await;
            }
        };

        if !response.is_cacheable() {
            tracing::debug!(%key, status = response.status.as_u16(), kind = ?response.kind, "passing through uncached");
        } else if method != Method::GET {
            tracing::debug!(%key, "not caching non-GET request");
        } else {
            self.store_in_background(key, response.to_cached()).await;
        }

        Interception::Respond { response, source: ResponseSource::Network }
    }

    async fn terminate(&self) {
        *self.state.write().await = ProxyState::Terminated;
        self.flush().await;
        tracing::info!(cache = %self.cache_name, "terminated");
    }
}
