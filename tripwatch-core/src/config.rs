//! Client connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TripwatchError;

/// Settings for reaching the Tripwatch backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL of the backend; endpoint paths are joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound for a single HTTP call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Per-call timeout, never shorter than one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Parse [`base_url`](Self::base_url).
    pub fn parsed_base_url(&self) -> Result<Url, TripwatchError> {
        let url = Url::parse(&self.base_url).map_err(|e| TripwatchError::Config {
            message: format!("invalid base URL {:?}: {}", self.base_url, e),
        })?;

        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(TripwatchError::Config {
                message: format!("base URL must be http(s): {:?}", self.base_url),
            });
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"https://api.example.com"}"#).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_parsed_base_url_rejects_bad_values() {
        assert!(ClientConfig::new("https://api.example.com").parsed_base_url().is_ok());
        assert!(ClientConfig::new("not a url").parsed_base_url().is_err());
        assert!(ClientConfig::new("ftp://example.com").parsed_base_url().is_err());
        assert!(ClientConfig::new("mailto:someone@example.com").parsed_base_url().is_err());
    }

    #[test]
    fn test_with_timeout_floor() {
        let config = ClientConfig::default().with_timeout(Duration::from_millis(10));
        assert_eq!(config.request_timeout_secs, 1);
    }

    #[test]
    fn test_zero_timeout_from_file_is_floored() {
        let config: ClientConfig = serde_json::from_str(r#"{"request_timeout_secs":0}"#).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
