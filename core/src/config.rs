//! Client configuration.
//!
//! # Design
//! `ClientConfig` is plain data: an API key plus a base URL and user agent that
//! default to the production values. `from_env` reads the `EVTRACKER_*`
//! variables through a lookup closure, so tests pass a map instead of touching
//! the process environment. Values are trimmed and blank optional values fall
//! back to the defaults; a missing or blank API key is a `Config` error.

use crate::error::{EvTrackerError, Result};

/// Production API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.evtracker.cz/api/v1";

/// `User-Agent` sent when the caller does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("evtracker-rs/", env!("CARGO_PKG_VERSION"));

/// Construction parameters for `EvTrackerClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Read `EVTRACKER_API_KEY`, `EVTRACKER_BASE_URL` and `EVTRACKER_USER_AGENT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_blank(&lookup, "EVTRACKER_API_KEY")
            .ok_or_else(|| EvTrackerError::config("EVTRACKER_API_KEY is required"))?;

        let mut config = Self::new(api_key);
        if let Some(base_url) = non_blank(&lookup, "EVTRACKER_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(user_agent) = non_blank(&lookup, "EVTRACKER_USER_AGENT") {
            config.user_agent = user_agent;
        }
        Ok(config)
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_api_key() {
        let result = ClientConfig::from_lookup(|_| None);
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: EVTRACKER_API_KEY is required"
        );
    }

    #[test]
    fn rejects_blank_api_key() {
        let result = ClientConfig::from_lookup(|key| match key {
            "EVTRACKER_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn applies_defaults_for_optional_fields() {
        let config = ClientConfig::from_lookup(|key| match key {
            "EVTRACKER_API_KEY" => Some(" key-123 ".to_string()),
            "EVTRACKER_BASE_URL" => Some(String::new()),
            _ => None,
        })
        .expect("config should be valid");

        assert_eq!(config.api_key, "key-123");
        assert_eq!(config.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(|key| match key {
            "EVTRACKER_API_KEY" => Some("k".to_string()),
            "EVTRACKER_BASE_URL" => Some("http://localhost:3000/".to_string()),
            "EVTRACKER_USER_AGENT" => Some("ha-integration/2.0".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:3000/");
        assert_eq!(config.user_agent, "ha-integration/2.0");
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = ClientConfig::new("k")
            .with_base_url("https://staging.example/api/v1")
            .with_user_agent("custom");
        assert_eq!(config.base_url, "https://staging.example/api/v1");
        assert_eq!(config.user_agent, "custom");
    }
}
