//! Outcomes of lifecycle events and interceptions.

use serde::{Deserialize, Serialize};

use crate::fetch::{ProxyRequest, ProxyResponse};

/// A tracked route that could not be pre-cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFailure {
    pub route: String,
    pub reason: String,
}

/// Result of the install event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub cache_name: String,
    /// Routes stored, in tracked order.
    pub cached: Vec<String>,
    /// Routes that failed, in tracked order.
    pub failed: Vec<RouteFailure>,
}

/// Result of the activate event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub cache_name: String,
    /// Stale stores removed.
    pub deleted: Vec<String>,
    /// Stale stores that could not be removed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Hit in the active store.
    Cache,
    /// Fetched over the network.
    Network,
    /// Network failed; the cached root route was served instead.
    Fallback,
    /// Network failed and no fallback entry existed.
    Synthesized,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Synthesized => "synthesized",
        }
    }
}

/// Decision for one intercepted request.
#[derive(Debug)]
pub enum Interception {
    /// The proxy stays out of the way; the caller issues the request natively.
    Bypass(ProxyRequest),
    /// The proxy answers the request.
    Respond { response: ProxyResponse, source: ResponseSource },
}

impl Interception {
    pub fn is_bypass(&self) -> bool {
        matches!(self, Interception::Bypass(_))
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Interception::Bypass(_) => None,
            Interception::Respond { source, .. } => Some(*source),
        }
    }
}
