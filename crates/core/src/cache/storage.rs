//! The cache storage handle injected into the proxy.

use async_trait::async_trait;

use super::entry::{CachedResponse, RequestKey};
use crate::Error;

/// Named key-value stores of captured responses.
///
/// Implementations serialize concurrent operations internally; callers add
/// no locking of their own. A concurrent `put` and `lookup` of the same key
/// may observe either the old or the new value.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store, creating it if absent. Opening twice is a no-op.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Names of all existing stores, in creation order.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and all of its entries. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up a request identity. A missing store is a miss, not an error.
    async fn lookup(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error>;

    /// Store a response under `key`, creating the store if needed and
    /// replacing any previous entry.
    async fn put(&self, name: &str, key: &RequestKey, response: &CachedResponse) -> Result<(), Error>;

    /// Number of entries in a store (0 if the store does not exist).
    async fn entry_count(&self, name: &str) -> Result<usize, Error>;

    /// Request identities held by a store, oldest first.
    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error>;

    /// Record `name` as the activated store, replacing any earlier record.
    async fn mark_active(&self, name: &str) -> Result<(), Error>;

    /// The store last recorded by `mark_active`, if it still exists.
    async fn active_store(&self) -> Result<Option<String>, Error>;
}
