use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::{access_log::REQUEST_ID_HEADER, auth::CLIENT_TOKEN_HEADER};
use crate::{config::Config, upstream::CACHE_STATUS_HEADER};

/// CORS headers for every response. Any `OPTIONS` request is answered by the
/// layer itself and never reaches auth, rate limiting or upstream.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match config.cors_origin.as_deref() {
        None => AllowOrigin::from(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!("invalid CORS origin {:?}, allowing any origin", origin);
                AllowOrigin::from(Any)
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([HeaderName::from_static(CLIENT_TOKEN_HEADER), header::CONTENT_TYPE])
        .expose_headers([
            HeaderName::from_static(CACHE_STATUS_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .max_age(Duration::from_secs(600))
}

/// Turns the empty preflight answer into `204 No Content`.
pub async fn preflight_no_content(req: Request<Body>, next: Next) -> Response {
    let is_preflight = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
