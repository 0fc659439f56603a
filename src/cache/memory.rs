use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::upstream::UpstreamResponse;

struct CacheEntry {
    value: UpstreamResponse,
    expires_at: Instant,
}

/// In-process response cache with per-entry expiry.
///
/// Expired entries are dropped lazily on `get` and in bulk by
/// [`MemoryCache::purge_expired`]. A zero TTL stores nothing.
pub struct MemoryCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<UpstreamResponse> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: &str, value: UpstreamResponse) {
        self.set_at(key, value, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<UpstreamResponse> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // only drop it if nobody wrote a fresh one in between
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn set_at(&self, key: &str, value: UpstreamResponse, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        let Some(expires_at) = now.checked_add(self.ttl) else {
            tracing::warn!("cache ttl {:?} overflows the clock, not caching {}", self.ttl, key);
            return;
        };
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Drops every entry that has expired by `now`; returns how many.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use std::sync::Arc;

    fn payload(body: &'static str) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn hit_before_expiry() {
        let cache = MemoryCache::new(Duration::from_secs(30));
        let now = Instant::now();
        cache.set_at("/leagues", payload("a"), now);
        assert_eq!(
            cache.get_at("/leagues", now + Duration::from_secs(29)),
            Some(payload("a"))
        );
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let cache = MemoryCache::new(Duration::from_secs(30));
        let now = Instant::now();
        cache.set_at("/leagues", payload("a"), now);
        assert_eq!(cache.get_at("/leagues", now + Duration::from_secs(30)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_replaces_value_and_expiry() {
        let cache = MemoryCache::new(Duration::from_secs(30));
        let now = Instant::now();
        cache.set_at("/teams", payload("old"), now);
        cache.set_at("/teams", payload("new"), now + Duration::from_secs(20));
        assert_eq!(
            cache.get_at("/teams", now + Duration::from_secs(40)),
            Some(payload("new"))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn purge_drops_only_expired() {
        let cache = MemoryCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.set_at("old", payload("a"), now);
        cache.set_at("fresh", payload("b"), now + Duration::from_secs(8));
        assert_eq!(cache.purge_expired(now + Duration::from_secs(12)), 1);
        assert!(cache.get_at("fresh", now + Duration::from_secs(12)).is_some());
    }

    #[test]
    fn concurrent_writers_do_not_corrupt() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(30)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("/fixtures?id={}", (i * 100 + j) % 50);
                        cache.set(&key, payload("x"));
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 50);
    }

    #[test]
    fn unrepresentable_expiry_skips_the_write() {
        let cache = MemoryCache::new(Duration::from_secs(u64::MAX));
        cache.set("/leagues", payload("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_stores_nothing() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.set("/leagues", payload("a"));
        assert!(cache.get("/leagues").is_none());
        assert!(cache.is_empty());
    }
}
