//! Versioned cache stores for captured request/response pairs.
//!
//! The proxy talks to storage only through the [`CacheStorage`] handle,
//! injected at construction. Two backends are provided:
//!
//! - [`CacheDb`]: persistent SQLite storage via tokio-rusqlite, WAL mode,
//!   automatic schema migrations
//! - [`MemoryStorage`]: an in-process map for tests and ephemeral runs

pub mod connection;
pub mod entry;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod storage;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::{CachedResponse, RequestKey};
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
