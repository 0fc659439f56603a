mod access_log;
mod auth;
mod cors;
mod rate_limit;

pub use access_log::{REQUEST_ID_HEADER, log_requests};
pub use auth::{AuthGuard, AuthOutcome, CLIENT_TOKEN_HEADER, PUBLIC_PATHS, auth_middleware};
pub use cors::{cors_layer, preflight_no_content};
pub use rate_limit::{RateLimiter, client_identity, rate_limit};
