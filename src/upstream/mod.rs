mod client;

pub use client::{UpstreamClient, build_url};

use std::fmt;

use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// What the upstream API answered: status, content type and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Relays the upstream answer as-is, tagged with where it came from.
    pub fn relay(self, cache: CacheStatus) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache.as_str()));
        response
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        self.relay(CacheStatus::Miss)
    }
}

/// Transport-level failure talking to upstream. Statuses returned by
/// upstream are not errors and never end up here.
#[derive(Debug)]
pub enum UpstreamError {
    Timeout(reqwest::Error),
    Unreachable(reqwest::Error),
}

impl UpstreamError {
    /// Text safe to hand back to callers.
    pub fn public_detail(&self) -> &'static str {
        match self {
            UpstreamError::Timeout(_) => "upstream request timed out",
            UpstreamError::Unreachable(_) => "upstream service unreachable",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(e)
        } else {
            UpstreamError::Unreachable(e)
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Timeout(e) => write!(f, "upstream timeout: {}", e),
            UpstreamError::Unreachable(e) => write!(f, "upstream unreachable: {}", e),
        }
    }
}

impl std::error::Error for UpstreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: Option<&str>) -> UpstreamResponse {
        UpstreamResponse {
            status,
            content_type: content_type.map(str::to_owned),
            body: Bytes::from_static(b"{\"response\":[]}"),
        }
    }

    #[test]
    fn only_2xx_counts_as_success() {
        assert!(response(200, None).is_success());
        assert!(response(204, None).is_success());
        assert!(!response(304, None).is_success());
        assert!(!response(429, None).is_success());
        assert!(!response(500, None).is_success());
    }

    #[tokio::test]
    async fn relay_keeps_status_and_content_type() {
        let relayed = response(429, Some("application/json")).relay(CacheStatus::Hit);
        assert_eq!(relayed.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(relayed.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(relayed.headers()[CACHE_STATUS_HEADER], "HIT");
        let body = axum::body::to_bytes(relayed.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{\"response\":[]}");
    }

    #[test]
    fn missing_content_type_is_not_invented() {
        let relayed = response(200, None).relay(CacheStatus::Miss);
        assert!(relayed.headers().get(header::CONTENT_TYPE).is_none());
    }
}
