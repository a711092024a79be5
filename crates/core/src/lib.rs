//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Cache storage handle with SQLite and in-memory backends
//! - Cache naming, tracked routes and the exclusion predicate
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod routes;

pub use cache::{CacheDb, CacheStorage, CachedResponse, MemoryStorage, RequestKey};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use routes::{CacheName, ExclusionPredicate, MatchMode, TrackedRoutes};
