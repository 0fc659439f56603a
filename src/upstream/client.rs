use std::time::{Duration, Instant};

use reqwest::{
    Client,
    header::{CONTENT_TYPE, HeaderName, HeaderValue},
};

use super::{UpstreamError, UpstreamResponse};
use crate::config::{Config, ConfigError};
use crate::error::StartupError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RAPIDAPI_HOST_HEADER: &str = "x-rapidapi-host";

/// Thin wrapper around a pooled HTTP client that knows the upstream base URL
/// and attaches the server-held credential to every call.
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    key_header: HeaderName,
    api_key: HeaderValue,
    host: Option<HeaderValue>,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let key_header = HeaderName::from_bytes(config.upstream_key_header.as_bytes()).map_err(
            |_| ConfigError::Invalid {
                key: "UPSTREAM_KEY_HEADER",
                value: config.upstream_key_header.clone(),
            },
        )?;
        let mut api_key =
            HeaderValue::from_str(&config.api_key).map_err(|_| ConfigError::Invalid {
                key: "API_FOOTBALL_KEY",
                value: "<redacted>".to_string(),
            })?;
        api_key.set_sensitive(true);
        let host = config
            .upstream_host
            .as_deref()
            .map(|h| {
                HeaderValue::from_str(h).map_err(|_| ConfigError::Invalid {
                    key: "UPSTREAM_HOST",
                    value: h.to_string(),
                })
            })
            .transpose()?;

        let timeout = config.upstream_timeout();
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.upstream_base_url.trim_end_matches('/').to_string(),
            key_header,
            api_key,
            host,
        })
    }

    /// GETs `path` upstream with the query passed through untouched.
    pub async fn forward(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = build_url(&self.base_url, path, query);
        let started = Instant::now();

        let mut request = self
            .http_client
            .get(&url)
            .header(self.key_header.clone(), self.api_key.clone());
        if let Some(host) = &self.host {
            request = request.header(RAPIDAPI_HOST_HEADER, host.clone());
        }
        let response = request.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        tracing::debug!(
            path,
            status,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream call finished"
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

pub fn build_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(qs) => format!("{}{}?{}", base_url, path, qs),
        None => format!("{}{}", base_url, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_appended_verbatim() {
        assert_eq!(
            build_url(
                "https://v3.football.api-sports.io",
                "/fixtures",
                Some("season=2025&date=2025-10-24&league=39")
            ),
            "https://v3.football.api-sports.io/fixtures?season=2025&date=2025-10-24&league=39"
        );
    }

    #[test]
    fn empty_query_is_dropped() {
        assert_eq!(build_url("http://u", "/leagues", Some("")), "http://u/leagues");
        assert_eq!(build_url("http://u", "/leagues", None), "http://u/leagues");
    }

    #[test]
    fn invalid_key_header_is_a_startup_error() {
        let mut config = Config::new("k", "http://127.0.0.1:1");
        config.upstream_key_header = "bad header".to_string();
        assert!(matches!(
            UpstreamClient::new(&config),
            Err(StartupError::Config(ConfigError::Invalid { key: "UPSTREAM_KEY_HEADER", .. }))
        ));
    }

    #[test]
    fn trailing_slash_in_base_url_is_trimmed() {
        let client = UpstreamClient::new(&Config::new("k", "http://127.0.0.1:1/")).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:1");
    }
}
