//! Cache naming, the tracked route set and the exclusion predicate.
//!
//! These are the deploy-time constants of the proxy. They are built once
//! from configuration and never change while a proxy version is alive.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default prefix of the versioned cache store name.
pub const DEFAULT_CACHE_PREFIX: &str = "histoscan-cache-v";

/// Default cache version ordinal.
pub const DEFAULT_CACHE_VERSION: u32 = 3;

/// Path whose cached entry is served when the network is unreachable.
pub const FALLBACK_ROUTE: &str = "/";

/// Top-level application screens pre-cached on install.
pub const DEFAULT_ROUTES: &[&str] = &["/", "/login", "/dashboard", "/history", "/upload", "/result"];

/// URL markers for requests that must never touch the cache.
///
/// API calls, the hosted backend, the prediction service deployment and
/// generated icon assets.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["/api/", "supabase", "histoscan.onrender.com", "icons/icon-"];

/// Version-stamped cache store name, e.g. `histoscan-cache-v3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheName {
    prefix: String,
    version: u32,
}

impl CacheName {
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self { prefix: prefix.into(), version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The same name with another version ordinal.
    pub fn with_version(&self, version: u32) -> Self {
        Self { prefix: self.prefix.clone(), version }
    }
}

impl Default for CacheName {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_VERSION)
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.version)
    }
}

/// Ordered set of application paths pre-cached on install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRoutes {
    routes: Vec<String>,
}

impl TrackedRoutes {
    /// Build the set, dropping duplicates while keeping first occurrence order.
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for route in routes {
            let route = route.into();
            if !unique.contains(&route) {
                unique.push(route);
            }
        }
        Self { routes: unique }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains(&self, route: &str) -> bool {
        self.routes.iter().any(|r| r == route)
    }

    /// Position of a route in deploy order, used to sort install reports.
    pub fn position(&self, route: &str) -> Option<usize> {
        self.routes.iter().position(|r| r == route)
    }
}

impl Default for TrackedRoutes {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTES.iter().copied())
    }
}

/// How exclusion markers are compared against a request URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Literal substring containment against the full URL.
    #[default]
    Substring,
    /// Markers with a `/` match the path, markers without match the host.
    Structured,
}

/// Decides which requests bypass the cache entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPredicate {
    markers: Vec<String>,
    mode: MatchMode,
}

impl ExclusionPredicate {
    pub fn new<I, S>(markers: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { markers: markers.into_iter().map(Into::into).filter(|m: &String| !m.is_empty()).collect(), mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns the first marker that matches `url`, if any.
    pub fn matching_marker(&self, url: &str) -> Option<&str> {
        match self.mode {
            MatchMode::Substring => self.markers.iter().find(|m| url.contains(m.as_str())).map(String::as_str),
            MatchMode::Structured => match url::Url::parse(url) {
                Ok(parsed) => {
                    let host = parsed.host_str().unwrap_or("");
                    let path = parsed.path();
                    self.markers
                        .iter()
                        .find(|m| if m.contains('/') { path.contains(m.as_str()) } else { host.contains(m.as_str()) })
                        .map(String::as_str)
                }
                Err(e) => {
                    tracing::debug!(url, error = %e, "unparseable URL, using substring matching");
                    self.markers.iter().find(|m| url.contains(m.as_str())).map(String::as_str)
                }
            },
        }
    }

    /// True when `url` must bypass the cache.
    pub fn matches(&self, url: &str) -> bool {
        self.matching_marker(url).is_some()
    }
}

impl Default for ExclusionPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUSIONS.iter().copied(), MatchMode::Substring)
    }
}
