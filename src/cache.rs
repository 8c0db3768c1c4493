//! Process-private rule cache.
//!
//! The router only needs keyed get/put of a text payload with a TTL, so the
//! seam is the narrow `RuleCache` trait. `MemoryCache` is the in-process
//! implementation: entries expire at `inserted + ttl` and are evicted lazily
//! on the next read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::CacheError;

/// Longest lifetime `MemoryCache` will honor; longer TTLs are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Keyed text cache with per-entry expiry.
#[async_trait]
pub trait RuleCache: Send + Sync {
    /// Return the live value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct CachedValue {
    value: String,
    expires_at: Instant,
}

/// In-memory `RuleCache`, shared by cloning.
#[derive(Clone)]
pub struct MemoryCache {
    name: Arc<str>,
    entries: Arc<RwLock<HashMap<String, CachedValue>>>,
}

impl MemoryCache {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drop a single entry. Returns whether one was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl RuleCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: evict unless a fresh put raced in.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
            debug!(cache = %self.name, key, "Evicted expired cache entry");
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl = ttl.min(MAX_TTL);
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), CachedValue { value, expires_at });
        debug!(cache = %self.name, key, ttl_secs = ttl.as_secs(), "Cache entry stored");
        Ok(())
    }
}
