//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the cache stores.

pub mod get;
pub mod stores;

pub use get::{CacheGetParams, get_impl};
pub use stores::{CacheStoresOutput, stores_impl};
