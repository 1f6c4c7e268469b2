//! Cache service
//!
//! Stores JSON values under `<prefix><key>` with a TTL. Redis is used when it is
//! enabled in the settings, otherwise a process-local map stands in for it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RedisConfig;
use crate::utils::errors::Result;

/// Key of the cached `/api/dashboard/stats` payload
pub const DASHBOARD_STATS_KEY: &str = "dashboard:stats";
/// Key of the last trained customer segmentation
pub const SEGMENTS_KEY: &str = "analytics:segments";

#[derive(Clone)]
enum CacheBackend {
    Redis(ConnectionManager),
    Local(Arc<RwLock<HashMap<String, (String, Instant)>>>),
}

/// Cache for dashboard stats and trained segments
#[derive(Clone)]
pub struct CacheService {
    backend: CacheBackend,
    prefix: String,
    default_ttl: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub backend: String,
    pub total_keys: u64,
    pub prefix: String,
}

impl CacheService {
    /// Connect to Redis when enabled, otherwise use the local map
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::local(config));
        }

        let client = redis::Client::open(config.url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        info!(url = %config.url, "Connected to Redis cache");

        Ok(Self {
            backend: CacheBackend::Redis(manager),
            prefix: config.prefix.clone(),
            default_ttl: config.ttl_seconds,
        })
    }

    /// Process-local cache
    pub fn local(config: &RedisConfig) -> Self {
        Self {
            backend: CacheBackend::Local(Arc::new(RwLock::new(HashMap::new()))),
            prefix: config.prefix.clone(),
            default_ttl: config.ttl_seconds,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            CacheBackend::Redis(_) => "redis",
            CacheBackend::Local(_) => "memory",
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Set a value with TTL (the configured default when `None`)
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let serialized = serde_json::to_string(value)?;
        let full_key = self.full_key(key);
        let ttl = ttl_seconds.unwrap_or(self.default_ttl).max(1);

        match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = conn.set_ex(&full_key, serialized, ttl).await?;
            }
            CacheBackend::Local(map) => {
                let expires = Instant::now() + Duration::from_secs(ttl);
                map.write().await.insert(full_key.clone(), (serialized, expires));
            }
        }

        debug!(key = %full_key, ttl = ttl, "Value cached");
        Ok(())
    }

    /// Get a value, `None` when missing or expired
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let full_key = self.full_key(key);

        let raw: Option<String> = match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.get(&full_key).await?
            }
            CacheBackend::Local(map) => {
                let now = Instant::now();
                map.read()
                    .await
                    .get(&full_key)
                    .filter(|(_, expires)| *expires > now)
                    .map(|(value, _)| value.clone())
            }
        };

        match raw {
            Some(data) => {
                debug!(key = %full_key, "Cache hit");
                Ok(Some(serde_json::from_str::<T>(&data)?))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.full_key(key);

        let deleted = match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                let deleted: i32 = conn.del(&full_key).await?;
                deleted > 0
            }
            CacheBackend::Local(map) => map.write().await.remove(&full_key).is_some(),
        };

        debug!(key = %full_key, deleted = deleted, "Key deletion attempted");
        Ok(deleted)
    }

    /// Read-through helper: return the cached value or compute, store and return it
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, ttl_seconds: Option<u64>, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, recomputing"),
        }

        let value = compute().await?;
        if let Err(e) = self.set(key, &value, ttl_seconds).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    /// Drop a key, logging instead of failing
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.delete(key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let total_keys = match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                let keys: Vec<String> = conn.keys(format!("{}*", self.prefix)).await?;
                keys.len() as u64
            }
            CacheBackend::Local(map) => {
                let now = Instant::now();
                map.read().await.values().filter(|(_, expires)| *expires > now).count() as u64
            }
        };

        Ok(CacheStats {
            backend: self.backend_name().to_string(),
            total_keys,
            prefix: self.prefix.clone(),
        })
    }

    /// Health check for the cache backend
    pub async fn health_check(&self) -> bool {
        match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(response) => response == "PONG",
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        false
                    }
                }
            }
            CacheBackend::Local(_) => true,
        }
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend_name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_cache() -> CacheService {
        CacheService::local(&RedisConfig::default())
    }

    #[tokio::test]
    async fn test_local_set_get_delete() {
        let cache = local_cache();
        cache.set("answer", &42u32, None).await.unwrap();
        assert_eq!(cache.get::<u32>("answer").await.unwrap(), Some(42));
        assert!(cache.delete("answer").await.unwrap());
        assert_eq!(cache.get::<u32>("answer").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_or_compute_caches_value() {
        let cache = local_cache();
        let first: u32 = cache.get_or_compute("k", Some(60), || async { Ok(1) }).await.unwrap();
        let second: u32 = cache.get_or_compute("k", Some(60), || async { Ok(2) }).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn test_stats_report_local_backend() {
        let cache = local_cache();
        cache.set("a", &"x", None).await.unwrap();
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.total_keys, 1);
    }
}
