//! Gateway configuration parsed from environment variables.

use crate::redirect::RedirectPolicy;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid gateway URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeouts: GatewayTimeouts,
    pub redirect: RedirectPolicy,
}

impl GatewayConfig {
    /// Config with default timeouts and redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] unless `base_url` is an absolute
    /// `http`/`https` URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            timeouts: GatewayTimeouts::default(),
            redirect: RedirectPolicy::default(),
        })
    }

    /// Build typed gateway config from environment variables.
    ///
    /// Required:
    /// - `MATHMIND_GATEWAY_URL`
    ///
    /// Optional:
    /// - `MATHMIND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `MATHMIND_CONNECT_TIMEOUT_SECS`: default 10
    /// - `MATHMIND_REDIRECT_RULES`: comma list of `password_setup`,
    ///   `profile_completion`, `all`, `none` (default `none`)
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required var is missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = std::env::var("MATHMIND_GATEWAY_URL").map_err(|_| ConfigError::Missing("MATHMIND_GATEWAY_URL"))?;
        Self::from_env_with_base_url(&raw_url)
    }

    /// Like [`GatewayConfig::from_env`] but with an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when any value fails to parse.
    pub fn from_env_with_base_url(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(base_url)?;
        let timeouts = GatewayTimeouts {
            request_secs: env_parse_u64("MATHMIND_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_u64("MATHMIND_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let redirect = match std::env::var("MATHMIND_REDIRECT_RULES") {
            Ok(raw) => RedirectPolicy::parse(&raw)
                .ok_or(ConfigError::Invalid { var: "MATHMIND_REDIRECT_RULES", value: raw })?,
            Err(_) => RedirectPolicy::default(),
        };
        Ok(Self { base_url, timeouts, redirect })
    }
}

fn env_parse_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid { var: key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
