//! Result and token caches.
//!
//! ## Backends
//!
//! - **Local**: DashMap per process, expiry driven by an injected [`Clock`]
//! - **Redis**: shared across instances, values stored as JSON with `SET EX`
//!
//! If Redis is configured but unreachable, [`create_cache_store`] falls back
//! to the local store so the gateway still starts.
//!
//! [`Clock`]: crate::clock::Clock

pub mod keys;
pub mod local;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::clock::Clock;
use crate::config::{CacheBackendKind, CacheConfig};

pub use local::LocalCacheStore;
pub use redis_store::RedisCacheStore;

/// Key/value store with per-entry TTL. Writes are last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn put(&self, key: &str, value: Value, ttl: Duration);

    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn forget(&self, key: &str);

    fn stats(&self) -> CacheStats;

    /// Drop expired entries; returns how many were removed. Stores that
    /// expire entries themselves keep the default.
    fn cleanup_expired(&self) -> usize {
        0
    }
}

/// Sweep `store` every `every` until the runtime shuts down.
pub fn start_cleanup_task(store: Arc<dyn CacheStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            let removed = store.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "cache cleanup completed");
            }
        }
    })
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub mode: &'static str,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Read `key` and decode it as `T`. Undecodable entries count as misses.
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let value = store.get(key).await?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
            None
        }
    }
}

/// Encode `value` as JSON and store it under `key`.
pub async fn put_json<T: Serialize>(store: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_value(value) {
        Ok(encoded) => store.put(key, encoded, ttl).await,
        Err(e) => tracing::warn!(key = %key, error = %e, "failed to encode cache entry"),
    }
}

/// Create the configured cache store.
///
/// Redis is checked once at startup; a failed pool creation or connection
/// degrades to the local store.
pub async fn create_cache_store(config: &CacheConfig, clock: Arc<dyn Clock>) -> Arc<dyn CacheStore> {
    if config.backend == CacheBackendKind::Local {
        tracing::info!("using local cache");
        return Arc::new(LocalCacheStore::with_clock(clock));
    }

    tracing::info!(url = %config.redis.url, "connecting to Redis");

    match RedisCacheStore::connect(&config.redis).await {
        Ok(store) => {
            tracing::info!("connected to Redis");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, falling back to local cache");
            Arc::new(LocalCacheStore::with_clock(clock))
        }
    }
}
