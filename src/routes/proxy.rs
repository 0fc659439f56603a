use axum::response::Response;

use crate::{AppState, cache::cache_key, error::AppError, upstream::CacheStatus};

/// Public route -> upstream path.
pub const PROXY_ROUTES: &[(&str, &str)] = &[
    ("/leagues", "/leagues"),
    ("/fixtures", "/fixtures"),
    ("/teams", "/teams"),
    ("/standings", "/standings"),
    ("/events", "/fixtures/events"),
    ("/odds", "/odds"),
];

/// Serves `upstream_path` from the cache, or fetches and caches it.
///
/// Only 2xx answers are cached. Other upstream statuses are relayed as they
/// came; transport failures become a 502 and leave the cache untouched.
/// Concurrent misses for one key each go upstream.
pub async fn forward(
    state: &AppState,
    upstream_path: &'static str,
    query: Option<String>,
) -> Result<Response, AppError> {
    let key = cache_key(upstream_path, query.as_deref());

    if let Some(cached) = state.cache.get(&key).await {
        tracing::debug!("cache hit for {}", key);
        return Ok(cached.relay(CacheStatus::Hit));
    }

    let fresh = state
        .upstream
        .forward(upstream_path, query.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!("upstream call for {} failed: {}", key, e);
            AppError::Upstream(e)
        })?;

    if fresh.is_success() {
        state.cache.set(&key, &fresh).await;
    } else {
        tracing::info!("upstream answered {} for {}, not caching", fresh.status, key);
    }

    Ok(fresh.relay(CacheStatus::Miss))
}
