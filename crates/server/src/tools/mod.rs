//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offcache server.

pub mod cache;
pub mod lifecycle;
pub mod proxy_fetch;

pub use cache::{CacheGetParams, CacheStoresOutput};
pub use lifecycle::ProxyInstallParams;
pub use proxy_fetch::{ProxyFetchOutput, ProxyFetchParams};

use offcache_core::Error;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted network and host setup shared by tool tests.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use offcache_client::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use offcache_client::{
        Network, NetworkError, ProxyOptions, ProxyRequest, ProxyResponse, ResponseKind, StatusCode, Url,
    };
    use offcache_core::MemoryStorage;
    use rmcp::model::CallToolResult;

    use crate::host::ProxyHost;

    pub const ORIGIN: &str = "http://localhost:3000";

    pub struct FakeNetwork {
        pages: HashMap<String, StatusCode>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeNetwork {
        pub fn site() -> Self {
            let mut pages = HashMap::new();
            for route in ["/", "/login", "/dashboard", "/history", "/upload", "/result", "/about"] {
                pages.insert(format!("{ORIGIN}{route}"), StatusCode::OK);
            }
            pages.insert("https://histoscan.onrender.com/predict".to_string(), StatusCode::OK);
            Self { pages, offline: AtomicBool::new(false), calls: AtomicUsize::new(0) }
        }

        pub fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(NetworkError::Unreachable("offline".into()));
            }
            let status = self.pages.get(request.url.as_str()).copied().unwrap_or(StatusCode::NOT_FOUND);
            let kind = if request.url.as_str().starts_with(ORIGIN) { ResponseKind::Basic } else { ResponseKind::Cors };
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
            Ok(ProxyResponse {
                body: format!("<html>{}</html>", request.url.path()).into(),
                url: request.url,
                status,
                headers,
                kind,
            })
        }
    }

    /// A booted host over in-memory storage.
    pub async fn test_host(network: Arc<FakeNetwork>) -> ProxyHost {
        let origin = Url::parse(ORIGIN).unwrap();
        let host = ProxyHost::new(Arc::new(MemoryStorage::new()), network, ProxyOptions::new(origin));
        host.boot().await.unwrap();
        host
    }

    /// Parse the JSON text content of a tool result.
    pub fn output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
