//! Lifecycle states of a proxy version.

use std::fmt;

/// Where a proxy version is in its lifecycle.
///
/// `Installing → Installed → Activating → Active → Terminated`. A proxy
/// resumed over the store an earlier run activated jumps straight from
/// `Installing` to `Active`; one adopting an installed store jumps to
/// `Installed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyState {
    Installing,
    Installed,
    Activating,
    Active { cache_name: String },
    Terminated,
}

impl ProxyState {
    pub fn is_active(&self) -> bool {
        matches!(self, ProxyState::Active { .. })
    }
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyState::Installing => f.write_str("installing"),
            ProxyState::Installed => f.write_str("installed"),
            ProxyState::Activating => f.write_str("activating"),
            ProxyState::Active { cache_name } => write!(f, "active ({cache_name})"),
            ProxyState::Terminated => f.write_str("terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProxyState::Installing.to_string(), "installing");
        let active = ProxyState::Active { cache_name: "histoscan-cache-v3".into() };
        assert_eq!(active.to_string(), "active (histoscan-cache-v3)");
        assert!(active.is_active());
        assert!(!ProxyState::Terminated.is_active());
    }
}
