//! In-memory cache storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::entry::{CachedResponse, RequestKey};
use super::storage::CacheStorage;
use crate::Error;

struct MemoryStore {
    name: String,
    /// Keyed by request hash.
    entries: HashMap<String, (RequestKey, CachedResponse)>,
    /// Hashes in insertion order.
    order: Vec<String>,
}

impl MemoryStore {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: HashMap::new(), order: Vec::new() }
    }
}

/// Cache storage held entirely in process memory.
///
/// Uses a tokio RwLock over the store list, so lookups run concurrently and
/// writes are serialized.
#[derive(Default)]
pub struct MemoryStorage {
    stores: RwLock<Vec<MemoryStore>>,
    active: RwLock<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        if !stores.iter().any(|s| s.name == name) {
            stores.push(MemoryStore::new(name));
        }
        Ok(())
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|s| s.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name != name);
        let removed = stores.len() != before;
        if removed {
            let mut active = self.active.write().await;
            if active.as_deref() == Some(name) {
                *active = None;
            }
        }
        Ok(removed)
    }

    async fn lookup(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        let stores = self.stores.read().await;
        let hash = key.hash();
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.entries.get(&hash))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &CachedResponse) -> Result<(), Error> {
        let mut stores = self.stores.write().await;
        let index = match stores.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                stores.push(MemoryStore::new(name));
                stores.len() - 1
            }
        };
        let store = &mut stores[index];
        let hash = key.hash();
        if store.entries.insert(hash.clone(), (key.clone(), response.clone())).is_none() {
            store.order.push(hash);
        }
        Ok(())
    }

    async fn entry_count(&self, name: &str) -> Result<usize, Error> {
        let stores = self.stores.read().await;
        Ok(stores.iter().find(|s| s.name == name).map_or(0, |s| s.entries.len()))
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .map(|s| {
                s.order
                    .iter()
                    .filter_map(|hash| s.entries.get(hash).map(|(key, _)| key.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mark_active(&self, name: &str) -> Result<(), Error> {
        self.open(name).await?;
        *self.active.write().await = Some(name.to_string());
        Ok(())
    }

    async fn active_store(&self) -> Result<Option<String>, Error> {
        Ok(self.active.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str, body: &str) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".into(), "text/html".into())],
            body: body.as_bytes().to_vec(),
            stored_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.open("histoscan-cache-v3").await.unwrap();
        storage.open("histoscan-cache-v3").await.unwrap();
        assert_eq!(storage.names().await.unwrap(), vec!["histoscan-cache-v3"]);
    }

    #[tokio::test]
    async fn test_put_lookup_overwrite() {
        let storage = MemoryStorage::new();
        let key = RequestKey::get("http://localhost:3000/");
        storage.put("v1", &key, &response(&key.url, "old")).await.unwrap();
        storage.put("v1", &key, &response(&key.url, "new")).await.unwrap();

        let hit = storage.lookup("v1", &key).await.unwrap().unwrap();
        assert_eq!(hit.body, b"new");
        assert_eq!(storage.entry_count("v1").await.unwrap(), 1);
        assert_eq!(storage.keys("v1").await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_lookup_missing_store_is_miss() {
        let storage = MemoryStorage::new();
        let key = RequestKey::get("http://localhost:3000/");
        assert!(storage.lookup("absent", &key).await.unwrap().is_none());
        assert_eq!(storage.entry_count("absent").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let storage = MemoryStorage::new();
        let key = RequestKey::get("http://localhost:3000/login");
        storage.put("v1", &key, &response(&key.url, "one")).await.unwrap();
        assert!(storage.lookup("v2", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = MemoryStorage::new();
        storage.open("v1").await.unwrap();
        storage.open("v2").await.unwrap();
        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert_eq!(storage.names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_active_store_follows_mark_and_delete() {
        let storage = MemoryStorage::new();
        storage.open("v1").await.unwrap();
        assert_eq!(storage.active_store().await.unwrap(), None);

        storage.mark_active("v1").await.unwrap();
        storage.mark_active("v2").await.unwrap();
        assert_eq!(storage.active_store().await.unwrap().as_deref(), Some("v2"));

        storage.delete("v1").await.unwrap();
        assert_eq!(storage.active_store().await.unwrap().as_deref(), Some("v2"));
        storage.delete("v2").await.unwrap();
        assert_eq!(storage.active_store().await.unwrap(), None);
    }
}
