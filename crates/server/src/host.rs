//! Hosting of proxy versions.
//!
//! Plays the part of the browser: keeps the active proxy version, holds a
//! newly installed version as waiting, and promotes it on activation.

use std::sync::Arc;

use offcache_client::{
    ActivationReport, InstallReport, LifecycleEvents, Network, OfflineProxy, ProxyOptions, ProxyState,
};
use offcache_core::{CacheStorage, Error};
use tokio::sync::{Mutex, RwLock};

/// Owns the active and waiting proxy versions over one storage handle.
pub struct ProxyHost {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    options: ProxyOptions,
    active: RwLock<Arc<OfflineProxy>>,
    waiting: Mutex<Option<Arc<OfflineProxy>>>,
}

impl ProxyHost {
    /// Create a host whose first version is built from `options`.
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, options: ProxyOptions) -> Self {
        let first = OfflineProxy::new(Arc::clone(&storage), Arc::clone(&network), options.clone());
        Self { storage, network, options, active: RwLock::new(Arc::new(first)), waiting: Mutex::new(None) }
    }

    /// Bring the first version up.
    ///
    /// Resumes the store an earlier run activated. A store that was only
    /// installed is adopted and activated, so older stores get purged.
    /// Otherwise the version is installed from scratch.
    pub async fn boot(&self) -> Result<(), Error> {
        let proxy = self.active().await;
        match proxy.resume().await {
            Ok(()) => return Ok(()),
            Err(Error::InvalidState(reason)) => match proxy.adopt().await {
                Ok(()) => tracing::info!(%reason, "activating installed cache"),
                Err(Error::InvalidState(_)) => {
                    tracing::info!(%reason, "no installed cache, installing");
                    proxy.install().await?;
                }
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        }
        proxy.activate().await?;
        Ok(())
    }

    /// The version currently serving requests.
    pub async fn active(&self) -> Arc<OfflineProxy> {
        Arc::clone(&*self.active.read().await)
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Install a new version and park it as waiting.
    ///
    /// `version` defaults to the configured cache version. Installing the
    /// version that is already active is rejected.
    pub async fn install(&self, version: Option<u32>) -> Result<InstallReport, Error> {
        let mut options = self.options.clone();
        if let Some(version) = version {
            options.cache_name = options.cache_name.with_version(version);
        }

        let active = self.active().await;
        let name = options.cache_name.to_string();
        if name == active.cache_name() && active.state().await.is_active() {
            return Err(Error::InvalidInput(format!("cache {name} is already active")));
        }

        let proxy = Arc::new(OfflineProxy::new(Arc::clone(&self.storage), Arc::clone(&self.network), options));
        let report = proxy.install().await?;

        if let Some(replaced) = self.waiting.lock().await.replace(proxy) {
            tracing::info!(cache = %replaced.cache_name(), "discarded previously waiting version");
        }

        Ok(report)
    }

    /// Promote the waiting version: activate it, then terminate the old one.
    ///
    /// If activation fails the old version keeps serving and the new one
    /// stays waiting.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let waiting = self
            .waiting
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::InvalidState("no installed version is waiting".into()))?;

        let mut active = self.active.write().await;
        // old writes must land before activation purges their store
        active.flush().await;

        let report = match waiting.activate().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(cache = %waiting.cache_name(), error = %e, "activation failed, keeping current version");
                *self.waiting.lock().await = Some(waiting);
                return Err(e);
            }
        };

        if active.state().await != ProxyState::Terminated {
            active.terminate().await;
        }
        *active = waiting;

        Ok(report)
    }
}
