use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

pub const DEFAULT_UPSTREAM_URL: &str = "https://v3.football.api-sports.io";
pub const DEFAULT_UPSTREAM_KEY_HEADER: &str = "x-apisports-key";
pub const RAPIDAPI_KEY_HEADER: &str = "x-rapidapi-key";

const MAX_CACHE_TTL_SECS: u64 = 86_400;
const UPSTREAM_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=300;
const RATE_LIMIT_WINDOW_RANGE: RangeInclusive<u64> = 1..=86_400_000;

/// Whose requests share a rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// One window for every caller.
    Global,
    /// One window per client IP.
    Ip,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub upstream_base_url: String,
    pub upstream_key_header: String,
    /// Sent as `x-rapidapi-host` when set.
    pub upstream_host: Option<String>,
    pub upstream_timeout_secs: u64,
    pub client_token: Option<String>,
    /// `None` allows any origin.
    pub cors_origin: Option<String>,
    pub cache_ttl_secs: u64,
    pub redis_url: Option<String>,
    pub rate_limit_window_ms: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_scope: RateLimitScope,
    pub server_host: String,
    pub server_port: u16,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing required variable {}", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value {:?} for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Defaults for everything except the upstream credential and base URL.
    pub fn new(api_key: impl Into<String>, upstream_base_url: impl Into<String>) -> Self {
        Config {
            api_key: api_key.into(),
            upstream_base_url: upstream_base_url.into(),
            upstream_key_header: DEFAULT_UPSTREAM_KEY_HEADER.to_string(),
            upstream_host: None,
            upstream_timeout_secs: 10,
            client_token: None,
            cors_origin: None,
            cache_ttl_secs: 30,
            redis_url: None,
            rate_limit_window_ms: 60_000,
            rate_limit_requests: 100,
            rate_limit_scope: RateLimitScope::Global,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("API_FOOTBALL_KEY").ok_or(ConfigError::Missing("API_FOOTBALL_KEY"))?;
        let base_url = get("API_FOOTBALL_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let mut config = Config::new(api_key, base_url.trim_end_matches('/'));

        if let Some(header) = get("UPSTREAM_KEY_HEADER") {
            if HeaderName::from_bytes(header.as_bytes()).is_err() {
                return Err(ConfigError::Invalid {
                    key: "UPSTREAM_KEY_HEADER",
                    value: header,
                });
            }
            config.upstream_key_header = header.to_ascii_lowercase();
        }

        // RapidAPI wants the target host next to the key
        config.upstream_host = match get("UPSTREAM_HOST") {
            Some(host) => {
                if HeaderValue::from_str(&host).is_err() {
                    return Err(ConfigError::Invalid {
                        key: "UPSTREAM_HOST",
                        value: host,
                    });
                }
                Some(host)
            }
            None if config.upstream_key_header == RAPIDAPI_KEY_HEADER => {
                Some(host_of(&config.upstream_base_url).ok_or_else(|| ConfigError::Invalid {
                    key: "API_FOOTBALL_URL",
                    value: config.upstream_base_url.clone(),
                })?)
            }
            None => None,
        };

        config.client_token = get("CLIENT_TOKEN");

        config.cors_origin = match get("CORS_ORIGIN") {
            None => None,
            Some(origin) if origin == "*" => None,
            Some(origin) => {
                if HeaderValue::from_str(&origin).is_err() {
                    return Err(ConfigError::Invalid {
                        key: "CORS_ORIGIN",
                        value: origin,
                    });
                }
                Some(origin)
            }
        };

        config.redis_url = get("REDIS_URL");

        if let Some(v) = get("UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout_secs =
                parse_in_range("UPSTREAM_TIMEOUT_SECS", v, UPSTREAM_TIMEOUT_RANGE)?;
        }
        if let Some(v) = get("CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_in_range("CACHE_TTL_SECS", v, 0..=MAX_CACHE_TTL_SECS)?;
        }
        if let Some(v) = get("RATE_LIMIT_WINDOW_MS") {
            config.rate_limit_window_ms =
                parse_in_range("RATE_LIMIT_WINDOW_MS", v, RATE_LIMIT_WINDOW_RANGE)?;
        }
        if let Some(v) = get("RATE_LIMIT_MAX") {
            config.rate_limit_requests = parse_var("RATE_LIMIT_MAX", v)?;
        }
        if let Some(v) = get("RATE_LIMIT_SCOPE") {
            config.rate_limit_scope = match v.to_ascii_lowercase().as_str() {
                "global" => RateLimitScope::Global,
                "ip" => RateLimitScope::Ip,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "RATE_LIMIT_SCOPE",
                        value: v,
                    });
                }
            };
        }
        if let Some(v) = get("SERVER_HOST") {
            config.server_host = v;
        }
        if let Some(v) = get("PORT") {
            config.server_port = parse_var("PORT", v)?;
        }

        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn auth_enabled(&self) -> bool {
        self.client_token.is_some()
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_in_range(
    key: &'static str,
    value: String,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if range.contains(&n) => Ok(n),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}
