use sha2::{Digest, Sha256};

const REDIS_PREFIX: &str = "gateway:cache:";

/// Cache key for an upstream call: the forwarded path plus its query
/// segments in sorted order, so `a=1&b=2` and `b=2&a=1` share an entry.
/// Segments are compared raw; nothing is decoded.
pub fn cache_key(path: &str, query: Option<&str>) -> String {
    let mut segments: Vec<&str> = query
        .unwrap_or_default()
        .split('&')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return path.to_string();
    }
    segments.sort_unstable();
    format!("{}?{}", path, segments.join("&"))
}

/// Fixed-length Redis key, keeps arbitrary query strings out of the keyspace.
pub fn redis_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}{:x}", REDIS_PREFIX, digest)
}
