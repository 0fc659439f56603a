use axum::{
    Router,
    body::Body,
    extract::{RawQuery, State},
    http::{Method, Request},
    middleware::{Next, from_fn, from_fn_with_state},
    response::Response,
    routing::get,
};

use crate::{
    AppState,
    error::AppError,
    middleware::{
        PUBLIC_PATHS, auth_middleware, cors_layer, log_requests, preflight_no_content, rate_limit,
    },
    routes::{
        health::health,
        proxy::{self, PROXY_ROUTES},
    },
};

fn public_routes() -> Router<AppState> {
    let mut router = Router::new();
    for &path in PUBLIC_PATHS {
        router = router.route(path, get(health));
    }
    router
}

/// Rejects anything but GET/HEAD before it can use up a rate-limit slot.
async fn get_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Err(AppError::MethodNotAllowed);
    }
    Ok(next.run(req).await)
}

fn proxy_routes(state: &AppState) -> Router<AppState> {
    let mut router = Router::new();
    for &(route, upstream_path) in PROXY_ROUTES {
        router = router.route(
            route,
            get(
                move |State(state): State<AppState>, RawQuery(query): RawQuery| async move {
                    proxy::forward(&state, upstream_path, query).await
                },
            ),
        );
    }

    // last added runs first: auth -> method check -> rate limit
    router
        .route_layer(from_fn_with_state(state.clone(), rate_limit))
        .route_layer(from_fn(get_only))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Full gateway: access log, then CORS (which answers preflights), then
/// either a public route or auth -> rate limit -> cache -> upstream.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // liveness, no credentials
        .merge(public_routes())
        // proxied routes behind auth and rate limiting
        .merge(proxy_routes(&state))
        .fallback(not_found)
        // CORS answers preflights here, before any route layer
        .layer(cors_layer(&state.config))
        .layer(from_fn(preflight_no_content))
        // access log wraps everything
        .layer(from_fn(log_requests))
        .with_state(state)
}
