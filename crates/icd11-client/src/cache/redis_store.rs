use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde_json::Value;

use super::{CacheStats, CacheStore};
use crate::config::RedisConfig;
use icd11_core::{Icd11Error, Result};

/// Shared cache stored in Redis as JSON bytes.
///
/// Redis failures never surface to callers: reads degrade to misses and
/// writes are dropped, both with a `warn` log.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from `config` and check that one connection can be made.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let pool_config = redis_config.pool.get_or_insert_with(Default::default);
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Icd11Error::configuration(format!("invalid Redis pool: {e}")))?;

        pool.get()
            .await
            .map_err(|e| Icd11Error::configuration(format!("Redis connection failed: {e}")))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "failed to get Redis connection");
                return None;
            }
        };

        match conn.get::<_, Option<Vec<u8>>>(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    tracing::trace!(key = %key, "cache hit (redis)");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "corrupt Redis cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Redis GET error");
                None
            }
        }
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        let bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        match self.pool.get().await {
            Ok(mut conn) => {
                if let Err(e) = conn.set_ex::<_, _, ()>(key, bytes, ttl_secs).await {
                    tracing::warn!(key = %key, error = %e, "Redis SET error");
                } else {
                    tracing::trace!(key = %key, ttl_secs, "cache set (redis)");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to get Redis connection"),
        }
    }

    async fn forget(&self, key: &str) {
        match self.pool.get().await {
            Ok(mut conn) => {
                if let Err(e) = conn.del::<_, ()>(key).await {
                    tracing::warn!(key = %key, error = %e, "Redis DEL error");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to get Redis connection"),
        }
    }

    /// Entry counts live in Redis; only the mode is reported.
    fn stats(&self) -> CacheStats {
        CacheStats {
            mode: "redis",
            ..Default::default()
        }
    }
}
