use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::AppError};

/// Header the client presents the shared secret in.
pub const CLIENT_TOKEN_HEADER: &str = "x-client-token";

/// Paths reachable without credentials, for uptime monitoring. They are
/// routed outside the auth layer.
pub const PUBLIC_PATHS: &[&str] = &["/", "/health"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected,
}

/// Shared-secret check. With no token configured every caller is accepted.
#[derive(Debug, Clone, Default)]
pub struct AuthGuard {
    expected: Option<String>,
}

impl AuthGuard {
    pub fn new(expected: Option<String>) -> Self {
        Self { expected }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    pub fn check(&self, presented: Option<&str>) -> AuthOutcome {
        match (&self.expected, presented) {
            (None, _) => AuthOutcome::Accepted,
            (Some(expected), Some(presented)) if presented == expected => AuthOutcome::Accepted,
            _ => AuthOutcome::Rejected,
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(CLIENT_TOKEN_HEADER)
        .and_then(|header| header.to_str().ok());

    match state.auth.check(presented) {
        AuthOutcome::Accepted => Ok(next.run(request).await),
        AuthOutcome::Rejected => {
            tracing::info!(
                "rejected request to {} (token {})",
                request.uri().path(),
                if presented.is_some() { "invalid" } else { "missing" }
            );
            Err(AppError::Unauthorized)
        }
    }
}
