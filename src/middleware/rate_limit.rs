use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::{AppState, config::RateLimitScope, error::AppError};

const GLOBAL_IDENTITY: &str = "global";

struct RateWindow {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client identity.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    windows: DashMap<String, RateWindow>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
        }
    }

    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    /// Counts one request for `identity`. A rejected request does not count.
    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        // the entry guard holds the shard lock for the whole check-and-increment
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert(RateWindow {
                window_start: now,
                count: 0,
            });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Time until the current window of `identity` resets.
    pub fn retry_after(&self, identity: &str, now: Instant) -> Duration {
        self.windows
            .get(identity)
            .map(|w| {
                self.window
                    .saturating_sub(now.saturating_duration_since(w.window_start))
            })
            .unwrap_or_default()
    }

    /// Forgets windows that have run out; returns how many.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) < self.window);
        before.saturating_sub(self.windows.len())
    }
}

/// Resolves who a request is counted against.
pub fn client_identity(req: &Request<Body>, scope: RateLimitScope) -> String {
    match scope {
        RateLimitScope::Global => GLOBAL_IDENTITY.to_string(),
        RateLimitScope::Ip => {
            let remote_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string());

            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .or_else(|| {
                    req.headers()
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
                })
                .or(remote_ip.as_deref())
                .unwrap_or("unknown")
                .trim()
                .to_string()
        }
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = client_identity(&req, state.config.rate_limit_scope);

    if !state.limiter.allow(&identity) {
        let wait = state.limiter.retry_after(&identity, Instant::now());
        tracing::info!("rate limit exceeded for {}", identity);
        return Err(AppError::RateLimited {
            retry_after_secs: wait.as_secs_f64().ceil() as u64,
        });
    }

    Ok(next.run(req).await)
}
