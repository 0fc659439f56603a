mod keys;
mod memory;
mod models;
mod redis_store;

pub use keys::{cache_key, redis_key};
pub use memory::MemoryCache;
pub use models::CachedResponse;
pub use redis_store::{REDIS_TIMEOUT, RedisCache, RedisCacheError};

use std::time::Instant;

use crate::config::Config;
use crate::error::StartupError;
use crate::upstream::UpstreamResponse;

/// Response cache in front of the upstream API.
///
/// Best effort only: a backend failure is logged and reads as a miss, so
/// the caller falls through to a fresh upstream fetch.
pub enum ResponseCache {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl ResponseCache {
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        match &config.redis_url {
            Some(url) => {
                let client = redis::Client::open(url.as_str())?;
                Ok(ResponseCache::Redis(RedisCache::new(client, config.cache_ttl())))
            }
            None => Ok(ResponseCache::Memory(MemoryCache::new(config.cache_ttl()))),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            ResponseCache::Memory(_) => "memory",
            ResponseCache::Redis(_) => "redis",
        }
    }

    pub async fn get(&self, key: &str) -> Option<UpstreamResponse> {
        match self {
            ResponseCache::Memory(cache) => cache.get(key),
            ResponseCache::Redis(cache) => match cache.get(key).await {
                Ok(hit) => hit,
                Err(e) => {
                    tracing::warn!("cache read failed for {}: {}", key, e);
                    None
                }
            },
        }
    }

    pub async fn set(&self, key: &str, value: &UpstreamResponse) {
        match self {
            ResponseCache::Memory(cache) => cache.set(key, value.clone()),
            ResponseCache::Redis(cache) => {
                if let Err(e) = cache.set(key, value).await {
                    tracing::warn!("cache write failed for {}: {}", key, e);
                }
            }
        }
    }

    /// Sweeps expired entries; Redis expires keys on its own.
    pub fn purge_expired(&self, now: Instant) -> usize {
        match self {
            ResponseCache::Memory(cache) => cache.purge_expired(now),
            ResponseCache::Redis(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    #[tokio::test]
    async fn memory_backend_by_default() {
        let cache = ResponseCache::from_config(&Config::new("k", "http://u")).unwrap();
        assert_eq!(cache.backend(), "memory");

        let value = UpstreamResponse {
            status: 200,
            content_type: None,
            body: Bytes::from_static(b"[]"),
        };
        assert!(cache.get("/leagues").await.is_none());
        cache.set("/leagues", &value).await;
        assert_eq!(cache.get("/leagues").await, Some(value));
    }

    #[tokio::test]
    async fn unreachable_redis_reads_as_miss() {
        let mut config = Config::new("k", "http://u");
        config.redis_url = Some("redis://127.0.0.1:1".to_string());
        let cache = ResponseCache::from_config(&config).unwrap();
        assert_eq!(cache.backend(), "redis");

        let value = UpstreamResponse {
            status: 200,
            content_type: None,
            body: Bytes::from_static(b"[]"),
        };
        cache.set("/leagues", &value).await;
        assert!(cache.get("/leagues").await.is_none());
    }

    #[test]
    fn bad_redis_url_fails_startup() {
        let mut config = Config::new("k", "http://u");
        config.redis_url = Some("not a url".to_string());
        assert!(matches!(
            ResponseCache::from_config(&config),
            Err(StartupError::Redis(_))
        ));
    }
}
