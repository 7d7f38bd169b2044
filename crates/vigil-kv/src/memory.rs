//! In-process [`KvStore`] backend for deterministic tests (§8.1 / A4).
//!
//! Backed by a mutex-guarded map with explicit expiry timestamps checked
//! on every access — no background reaper, no wall-clock dependency
//! beyond `tokio::time::Instant`, so tests can drive `tokio::time::pause`
//! / `advance` to reproduce the §8 scenarios without a real Redis.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::KvError;
use crate::store::KvStore;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory key-value store matching the [`KvStore`] contract exactly,
/// including TTL expiry and the owner-checked atomic scripts.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn owner_of(value: &str) -> String {
        // Mirrors the Lua prelude in `redis_store`: try JSON first, fall
        // back to treating the whole value as a bare owner id.
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(value) {
            if let Some(owner) = json.get("owner_id").and_then(|v| v.as_str()) {
                return owner.to_string();
            }
        }
        value.to_string()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at <= now {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn conditional_update(
        &self,
        key: &str,
        owner_id: &str,
        new_value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                if Self::owner_of(&entry.value) != owner_id {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: new_value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn conditional_delete(&self, key: &str, owner_id: &str) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                if Self::owner_of(&entry.value) != owner_id {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
        entries.remove(key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_then_conflict() {
        let store = MemoryKvStore::new();
        assert!(
            store
                .set_if_absent("lease:s1", "owner-a", Duration::from_secs(30))
                .await
                .unwrap()
        );
        assert!(
            !store
                .set_if_absent("lease:s1", "owner-b", Duration::from_secs(30))
                .await
                .unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_makes_key_absent() {
        let store = MemoryKvStore::new();
        store
            .set("node:a", "hb", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(store.get("node:a").await.unwrap(), Some("hb".to_string()));
        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(store.get("node:a").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn conditional_update_requires_matching_owner() {
        let store = MemoryKvStore::new();
        store
            .set(
                "lease:s1",
                r#"{"owner_id":"a","acquired_at":"x","last_renewed_at":"x"}"#,
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        assert!(
            !store
                .conditional_update("lease:s1", "b", "new", Duration::from_secs(30))
                .await
                .unwrap()
        );
        assert!(
            store
                .conditional_update("lease:s1", "a", "new", Duration::from_secs(30))
                .await
                .unwrap()
        );
        assert_eq!(store.get("lease:s1").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn conditional_update_on_missing_key_fails() {
        let store = MemoryKvStore::new();
        assert!(
            !store
                .conditional_update("lease:missing", "a", "new", Duration::from_secs(30))
                .await
                .unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn conditional_delete_matches_legacy_bare_string() {
        let store = MemoryKvStore::new();
        store
            .set("lease:s1", "a", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(
            !store.conditional_delete("lease:s1", "b").await.unwrap()
        );
        assert!(store.conditional_delete("lease:s1", "a").await.unwrap());
        assert_eq!(store.get("lease:s1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_filters_by_prefix_and_drops_expired() {
        let store = MemoryKvStore::new();
        store
            .set("node:a", "x", Duration::from_secs(30))
            .await
            .unwrap();
        store
            .set("node:b", "x", Duration::from_millis(10))
            .await
            .unwrap();
        store
            .set("lease:s1", "x", Duration::from_secs(30))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        let mut nodes = store.scan("node:").await.unwrap();
        nodes.sort();
        assert_eq!(nodes, vec!["node:a".to_string()]);
    }
}
