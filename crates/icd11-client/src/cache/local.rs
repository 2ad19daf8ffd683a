use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use time::OffsetDateTime;

use super::{CacheStats, CacheStore};
use crate::clock::{Clock, SystemClock};

/// A cached value with its expiry instant.
///
/// The value is wrapped in `Arc` so hits clone a pointer, not the document.
#[derive(Clone, Debug)]
struct CachedEntry {
    value: Arc<Value>,
    expires_at: OffsetDateTime,
}

impl CachedEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// In-process cache backed by DashMap.
pub struct LocalCacheStore {
    entries: DashMap<String, CachedEntry>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

impl Default for LocalCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "cache hit");
                return Some(entry.value.as_ref().clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        let now = self.clock.now();
        let Some(expires_at) = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
        else {
            tracing::warn!(key = %key, ttl_secs = ttl.as_secs(), "TTL out of range, entry not cached");
            return;
        };
        let entry = CachedEntry {
            value: Arc::new(value),
            expires_at,
        };
        self.entries.insert(key.to_string(), entry);
        tracing::trace!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
    }

    async fn forget(&self, key: &str) {
        self.entries.remove(key);
        tracing::debug!(key = %key, "cache invalidated");
    }

    fn cleanup_expired(&self) -> usize {
        LocalCacheStore::cleanup_expired(self)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            mode: "local",
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
