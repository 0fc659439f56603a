use std::fmt;

use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::config::ConfigError;
use crate::upstream::UpstreamError;

pub mod error_codes {
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const NOT_FOUND: &str = "not_found";
    pub const METHOD_NOT_ALLOWED: &str = "method_not_allowed";
}

/// Terminal failures of a single request. Each maps to one status and body.
#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    RateLimited { retry_after_secs: u64 },
    Upstream(UpstreamError),
    NotFound,
    MethodNotAllowed,
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, detail, retry_after) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::UNAUTHORIZED,
                None,
                None,
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                error_codes::RATE_LIMITED,
                None,
                Some(*retry_after_secs),
            ),
            AppError::Upstream(e) => (
                StatusCode::BAD_GATEWAY,
                error_codes::UPSTREAM_ERROR,
                Some(e.public_detail()),
                None,
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, None, None),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                error_codes::METHOD_NOT_ALLOWED,
                None,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            ok: false,
            error,
            detail,
            retry_after,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET,HEAD"));
        }
        response
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::Upstream(e)
    }
}

/// Failures that keep the process from serving traffic.
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    HttpClient(reqwest::Error),
    Redis(redis::RedisError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "configuration error: {}", e),
            StartupError::HttpClient(e) => write!(f, "failed to build upstream client: {}", e),
            StartupError::Redis(e) => write!(f, "invalid redis configuration: {}", e),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<reqwest::Error> for StartupError {
    fn from(e: reqwest::Error) -> Self {
        StartupError::HttpClient(e)
    }
}

impl From<redis::RedisError> for StartupError {
    fn from(e: redis::RedisError) -> Self {
        StartupError::Redis(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_body_is_stable() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"ok": false, "error": "unauthorized"})
        );
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after_secs: 12 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
        let body = body_json(response).await;
        assert_eq!(body["error"], "rate_limited");
        assert_eq!(body["retry_after"], 12);
    }
}
