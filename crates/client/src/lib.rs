//! Client code for offcache.
//!
//! This crate provides the network layer and the offline cache proxy
//! shared by the server and CLI.

pub mod fetch;
pub mod proxy;

pub use fetch::{FetchClient, FetchConfig, Network, NetworkError, ProxyRequest, ProxyResponse, ResponseKind};
pub use proxy::{
    ActivationReport, InstallReport, Interception, LifecycleEvents, OfflineProxy, ProxyOptions, ProxyState,
    ResponseSource, RouteFailure,
};

pub use reqwest::{Method, StatusCode, Url, header};
