use std::time::Duration;

use redis::{AsyncCommands, Client as RedisClient, aio::ConnectionManager};
use tokio::sync::OnceCell;

use super::keys::redis_key;
use super::models::CachedResponse;
use crate::upstream::UpstreamResponse;

/// Upper bound for one cache round trip, connecting included.
pub const REDIS_TIMEOUT: Duration = Duration::from_millis(500);

/// Response cache kept in Redis so several gateway instances share it.
///
/// The connection is opened on first use and reconnects on its own; every
/// operation is bounded by [`REDIS_TIMEOUT`] so a stalled server reads as a miss.
pub struct RedisCache {
    client: RedisClient,
    connection: OnceCell<ConnectionManager>,
    ttl: Duration,
}

#[derive(Debug)]
pub enum RedisCacheError {
    Redis(redis::RedisError),
    Codec(serde_json::Error),
    Timeout,
}

impl std::fmt::Display for RedisCacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedisCacheError::Redis(e) => write!(f, "redis: {}", e),
            RedisCacheError::Codec(e) => write!(f, "codec: {}", e),
            RedisCacheError::Timeout => write!(f, "no answer within {:?}", REDIS_TIMEOUT),
        }
    }
}

impl From<redis::RedisError> for RedisCacheError {
    fn from(e: redis::RedisError) -> Self {
        RedisCacheError::Redis(e)
    }
}

impl From<serde_json::Error> for RedisCacheError {
    fn from(e: serde_json::Error) -> Self {
        RedisCacheError::Codec(e)
    }
}

impl RedisCache {
    pub fn new(client: RedisClient, ttl: Duration) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
            ttl,
        }
    }

    /// Redis expiry is whole seconds; sub-second TTLs round up to one.
    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }

    async fn connection(&self) -> Result<ConnectionManager, redis::RedisError> {
        let manager = self
            .connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(manager.clone())
    }

    pub async fn get(&self, key: &str) -> Result<Option<UpstreamResponse>, RedisCacheError> {
        tokio::time::timeout(REDIS_TIMEOUT, self.fetch(key))
            .await
            .map_err(|_| RedisCacheError::Timeout)?
    }

    /// A zero TTL disables caching, same as the in-memory backend.
    pub async fn set(&self, key: &str, value: &UpstreamResponse) -> Result<(), RedisCacheError> {
        if self.ttl.is_zero() {
            return Ok(());
        }
        tokio::time::timeout(REDIS_TIMEOUT, self.store(key, value))
            .await
            .map_err(|_| RedisCacheError::Timeout)?
    }

    async fn fetch(&self, key: &str) -> Result<Option<UpstreamResponse>, RedisCacheError> {
        let mut conn = self.connection().await?;
        let result: Option<String> = conn.get(redis_key(key)).await?;

        match result {
            Some(json) => {
                let cached: CachedResponse = serde_json::from_str(&json)?;
                Ok(Some(cached.into()))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, value: &UpstreamResponse) -> Result<(), RedisCacheError> {
        let json = serde_json::to_string(&CachedResponse::from(value))?;
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(redis_key(key), json, self.ttl_secs()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use tokio::net::TcpListener;

    fn payload() -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            content_type: None,
            body: Bytes::from_static(b"[]"),
        }
    }

    #[test]
    fn sub_second_ttl_rounds_up() {
        let client = RedisClient::open("redis://127.0.0.1:6379").unwrap();
        let cache = RedisCache::new(client, Duration::from_millis(200));
        assert_eq!(cache.ttl_secs(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_never_touches_redis() {
        // nothing listens on port 1, so any write attempt would fail
        let client = RedisClient::open("redis://127.0.0.1:1").unwrap();
        let cache = RedisCache::new(client, Duration::ZERO);
        assert!(cache.set("/leagues", &payload()).await.is_ok());
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = RedisClient::open(format!("redis://{}", addr)).unwrap();
        let cache = RedisCache::new(client, Duration::from_secs(30));

        let started = std::time::Instant::now();
        assert!(matches!(
            cache.get("/leagues").await,
            Err(RedisCacheError::Timeout)
        ));
        assert!(matches!(
            cache.set("/leagues", &payload()).await,
            Err(RedisCacheError::Timeout)
        ));
        assert!(started.elapsed() < REDIS_TIMEOUT * 4);
    }
}
