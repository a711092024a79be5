//! Store and entry operations on the SQLite backend.
//!
//! Stores live in `cache_stores`; entries in `cache_entries` cascade away
//! when their store is deleted.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::entry::{CachedResponse, RequestKey};
use super::storage::CacheStorage;
use crate::Error;

impl CacheDb {
    /// Create a store row if absent.
    pub async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List store names in creation order.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store; its entries go with it.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by store and request identity.
    ///
    /// Returns None if either the store or the entry doesn't exist.
    pub async fn get_entry(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        let name = name.to_string();
        let hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, body, stored_at
                     FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, body, stored_at)) => {
                        let status = u16::try_from(status)
                            .map_err(|_| Error::CorruptEntry(format!("status {status} out of range")))?;
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(CachedResponse { url, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry, creating its store if needed.
    pub async fn upsert_entry(&self, name: &str, key: &RequestKey, response: &CachedResponse) -> Result<(), Error> {
        let name = name.to_string();
        let key = key.clone();
        let hash = key.hash();
        let response = response.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                conn.execute(
                    "INSERT INTO cache_entries (
                        store, key_hash, method, url, status, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(store, key_hash) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        name,
                        hash,
                        key.method,
                        key.url,
                        i64::from(response.status),
                        headers_json,
                        response.body,
                        response.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Count entries in a store.
    pub async fn count_entries(&self, name: &str) -> Result<usize, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    /// List request identities held by a store, oldest first.
    pub async fn entry_keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM cache_entries WHERE store = ?1 ORDER BY rowid")?;
                let keys = stmt
                    .query_map(params![name], |row| {
                        Ok(RequestKey { method: row.get(0)?, url: row.get(1)? })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Stamp `name` as the activated store and clear the stamp on all others.
    pub async fn set_activated(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let now = chrono::Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                tx.execute("UPDATE cache_stores SET activated_at = NULL WHERE name != ?1", params![name])?;
                tx.execute("UPDATE cache_stores SET activated_at = ?2 WHERE name = ?1", params![name, now])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Name of the stamped store, if any.
    pub async fn activated_store(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM cache_stores WHERE activated_at IS NOT NULL
                     ORDER BY activated_at DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                );
                match result {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.open_store(name).await
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.store_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_store(name).await
    }

    async fn lookup(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        self.get_entry(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &CachedResponse) -> Result<(), Error> {
        self.upsert_entry(name, key, response).await
    }

    async fn entry_count(&self, name: &str) -> Result<usize, Error> {
        self.count_entries(name).await
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.entry_keys(name).await
    }

    async fn mark_active(&self, name: &str) -> Result<(), Error> {
        self.set_activated(name).await
    }

    async fn active_store(&self) -> Result<Option<String>, Error> {
        self.activated_store().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_response(url: &str) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![
                ("content-type".to_string(), "text/html; charset=utf-8".to_string()),
                ("etag".to_string(), "\"abc\"".to_string()),
            ],
            body: b"<html><body>HISTOSCAN</body></html>".to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("http://localhost:3000/dashboard");
        let response = make_test_response(&key.url);

        db.upsert_entry("histoscan-cache-v3", &key, &response).await.unwrap();

        let retrieved = db.get_entry("histoscan-cache-v3", &key).await.unwrap().unwrap();
        assert_eq!(retrieved, response);
        assert_eq!(db.store_names().await.unwrap(), vec!["histoscan-cache-v3"]);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("http://localhost:3000/missing");
        assert!(db.get_entry("histoscan-cache-v3", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("http://localhost:3000/");
        let mut response = make_test_response(&key.url);
        db.upsert_entry("v3", &key, &response).await.unwrap();

        response.body = b"updated".to_vec();
        db.upsert_entry("v3", &key, &response).await.unwrap();

        assert_eq!(db.count_entries("v3").await.unwrap(), 1);
        let retrieved = db.get_entry("v3", &key).await.unwrap().unwrap();
        assert_eq!(retrieved.body, b"updated");
    }

    #[tokio::test]
    async fn test_delete_store_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("http://localhost:3000/login");
        db.upsert_entry("histoscan-cache-v2", &key, &make_test_response(&key.url))
            .await
            .unwrap();
        db.open_store("histoscan-cache-v3").await.unwrap();

        assert!(db.delete_store("histoscan-cache-v2").await.unwrap());
        assert!(!db.delete_store("histoscan-cache-v2").await.unwrap());
        assert_eq!(db.count_entries("histoscan-cache-v2").await.unwrap(), 0);
        assert_eq!(db.store_names().await.unwrap(), vec!["histoscan-cache-v3"]);
    }

    #[tokio::test]
    async fn test_store_names_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("b").await.unwrap();
        db.open_store("a").await.unwrap();
        db.open_store("b").await.unwrap();
        assert_eq!(db.store_names().await.unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_entry_keys_through_trait() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let storage: &dyn CacheStorage = &db;
        let first = RequestKey::get("http://localhost:3000/");
        let second = RequestKey::get("http://localhost:3000/upload");
        storage.put("v3", &first, &make_test_response(&first.url)).await.unwrap();
        storage.put("v3", &second, &make_test_response(&second.url)).await.unwrap();

        assert_eq!(storage.keys("v3").await.unwrap(), vec![first, second]);
        assert_eq!(storage.entry_count("v3").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_activation_stamp_moves_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offcache.sqlite");

        let db = CacheDb::open(&path).await.unwrap();
        db.open_store("histoscan-cache-v3").await.unwrap();
        assert_eq!(db.activated_store().await.unwrap(), None);

        db.set_activated("histoscan-cache-v3").await.unwrap();
        db.open_store("histoscan-cache-v4").await.unwrap();
        assert_eq!(db.activated_store().await.unwrap().as_deref(), Some("histoscan-cache-v3"));
        drop(db);

        let db = CacheDb::open(&path).await.unwrap();
        assert_eq!(db.activated_store().await.unwrap().as_deref(), Some("histoscan-cache-v3"));

        db.set_activated("histoscan-cache-v4").await.unwrap();
        db.delete_store("histoscan-cache-v3").await.unwrap();
        assert_eq!(db.activated_store().await.unwrap().as_deref(), Some("histoscan-cache-v4"));

        db.delete_store("histoscan-cache-v4").await.unwrap();
        assert_eq!(db.activated_store().await.unwrap(), None);
    }
}
