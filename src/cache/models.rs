use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::upstream::UpstreamResponse;

/// Serialized form of an upstream response for out-of-process stores.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl From<&UpstreamResponse> for CachedResponse {
    fn from(response: &UpstreamResponse) -> Self {
        CachedResponse {
            status: response.status,
            content_type: response.content_type.clone(),
            body: response.body.to_vec(),
        }
    }
}

impl From<CachedResponse> for UpstreamResponse {
    fn from(cached: CachedResponse) -> Self {
        UpstreamResponse {
            status: cached.status,
            content_type: cached.content_type,
            body: Bytes::from(cached.body),
        }
    }
}
