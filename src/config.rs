//! Session configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::refresh::DEFAULT_REFRESH_LEAD;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_STORAGE_PATH: &str = ".ebank-session.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend origin without a trailing slash.
    pub api_base_url: String,
    pub storage_path: PathBuf,
    pub refresh_lead: Duration,
    pub timeouts: HttpTimeouts,
}

impl SessionConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `EBANK_API_BASE_URL`: default `http://localhost:8080`
    /// - `EBANK_STORAGE_PATH`: default `.ebank-session.json`
    /// - `EBANK_REFRESH_LEAD_SECS`: default 300
    /// - `EBANK_REQUEST_TIMEOUT_SECS`: default 30
    /// - `EBANK_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the base URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the base URL does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url =
            normalize_base_url(&lookup("EBANK_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()))?;
        let storage_path =
            lookup("EBANK_STORAGE_PATH").map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);
        let parse =
            |key: &str, default: u64| lookup(key).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default);
        let refresh_lead = Duration::from_secs(parse("EBANK_REFRESH_LEAD_SECS", DEFAULT_REFRESH_LEAD.as_secs()));
        let timeouts = HttpTimeouts {
            request_secs: parse("EBANK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse("EBANK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Ok(Self { api_base_url, storage_path, refresh_lead, timeouts })
    }

    /// Replace the base URL, keeping other settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if `raw` does not parse.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_base_url = normalize_base_url(raw)?;
        Ok(self)
    }

    /// Base of the `/auth` endpoints.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.api_base_url)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            refresh_lead: DEFAULT_REFRESH_LEAD,
            timeouts: HttpTimeouts::default(),
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(format!("{trimmed}: unsupported scheme")));
    }
    Ok(trimmed.to_owned())
}

