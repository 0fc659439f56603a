use std::sync::Arc;
use std::time::{Duration, Instant};

use config::Config;
use error::StartupError;

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod upstream;

use cache::ResponseCache;
use middleware::{AuthGuard, RateLimiter};
use upstream::UpstreamClient;

/// Process-wide state built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthGuard,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let upstream = UpstreamClient::new(&config)?;
        let cache = ResponseCache::from_config(&config)?;
        let limiter = RateLimiter::new(config.rate_limit_window(), config.rate_limit_requests);

        Ok(AppState {
            auth: AuthGuard::new(config.client_token.clone()),
            limiter: Arc::new(limiter),
            cache: Arc::new(cache),
            upstream,
            config: Arc::new(config),
        })
    }

    /// Periodically drops expired cache entries and stale rate windows.
    pub fn spawn_housekeeping(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.cache.clone();
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let purged = cache.purge_expired(now);
                let pruned = limiter.prune(now);
                if purged > 0 || pruned > 0 {
                    tracing::debug!(purged, pruned, "housekeeping pass");
                }
            }
        })
    }
}
