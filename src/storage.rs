use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPayload {
    pub key: String,
    pub payload: String,
    pub expires_at: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_cache(&self, key: &str, now: i64) -> Result<Option<String>>;
    async fn put_cache(&self, key: &str, payload: &str, expires_at: i64) -> Result<()>;
    /// Remove entries whose key starts with `prefix` (all entries when `None`).
    async fn clear_cache_prefix(&self, prefix: Option<&str>) -> Result<u64>;
    /// Drop every entry expired at `now`; returns how many went.
    async fn purge_expired(&self, now: i64) -> Result<u64>;
}

/// Process-local response cache. Expired rows are dropped when read and on
/// every `purge_expired` sweep.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, CachedPayload>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.entries.lock().await.len() }

    pub async fn is_empty(&self) -> bool { self.entries.lock().await.is_empty() }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_cache(&self, key: &str, now: i64) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let hit = entries.get(key).map(|e| (e.expires_at > now, e.payload.clone()));
        match hit {
            Some((true, payload)) => Ok(Some(payload)),
            Some((false, _)) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_cache(&self, key: &str, payload: &str, expires_at: i64) -> Result<()> {
        let entry = CachedPayload { key: key.to_string(), payload: payload.to_string(), expires_at };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn clear_cache_prefix(&self, prefix: Option<&str>) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        match prefix {
            Some(p) => entries.retain(|k, _| !k.starts_with(p)),
            None => entries.clear(),
        }
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self, now: i64) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}
