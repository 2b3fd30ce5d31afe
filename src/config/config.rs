//! Client configuration.

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::options::RequestOptions;

/// Base URL of the IPQS JSON API.
pub const DEFAULT_BASE_URL: &str = "https://www.ipqualityscore.com/api/json/";

const ENV_API_KEY: &str = "IPQS_API_KEY";
const ENV_BASE_URL: &str = "IPQS_BASE_URL";
const ENV_TIMEOUT: &str = "IPQS_TIMEOUT";

/// Errors raised while assembling a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IPQS API key is missing or empty")]
    MissingApiKey,
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default query options applied per endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointDefaults {
    pub ip: RequestOptions,
    pub email: RequestOptions,
    pub phone: RequestOptions,
}

impl Default for EndpointDefaults {
    fn default() -> Self {
        Self {
            ip: RequestOptions::new()
                .with("strictness", 1)
                .with("allow_public_access_points", true)
                .with("lighter_penalties", true),
            email: RequestOptions::new().with("timeout", 7),
            phone: RequestOptions::new(),
        }
    }
}

/// Polling behaviour of the bulk validation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkConfig {
    /// Retries after the first status check; `6` yields at most seven checks.
    pub max_retries: u32,
    pub poll_interval: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_retries: 6,
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct IpqsConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub defaults: EndpointDefaults,
    pub bulk: BulkConfig,
}

impl IpqsConfig {
    /// Configuration for `api_key` with every other field at its default.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self {
            api_key,
            base_url: parse_base_url(DEFAULT_BASE_URL)?,
            timeout: Duration::from_secs(10),
            defaults: EndpointDefaults::default(),
            bulk: BulkConfig::default(),
        })
    }

    /// Reads `IPQS_API_KEY`, plus optional `IPQS_BASE_URL` and `IPQS_TIMEOUT`
    /// (seconds).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var(ENV_API_KEY).map_err(|_| ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key)?;

        if let Ok(base_url) = env::var(ENV_BASE_URL) {
            config.base_url = parse_base_url(&base_url)?;
        }

        if let Ok(raw) = env::var(ENV_TIMEOUT) {
            config.timeout = parse_timeout(ENV_TIMEOUT, &raw)?;
        }

        Ok(config)
    }

    /// Parses a JSON document shaped like
    /// `{"api_key": "...", "timeout": 10.0, "defaults": {"ip": {...}}, "bulk": {...}}`.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(input)?;
        let mut config = Self::new(raw.api_key.unwrap_or_default())?;

        if let Some(base_url) = raw.base_url {
            config.base_url = parse_base_url(&base_url)?;
        }
        if let Some(timeout) = raw.timeout {
            config.timeout = seconds("timeout", timeout)?;
        }
        if let Some(defaults) = raw.defaults {
            config.defaults = defaults;
        }
        if let Some(bulk) = raw.bulk {
            if let Some(max_retries) = bulk.max_retries {
                config.bulk.max_retries = max_retries;
            }
            if let Some(interval) = bulk.poll_interval {
                config.bulk.poll_interval = seconds("bulk.poll_interval", interval)?;
            }
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_defaults(mut self, defaults: EndpointDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_bulk(mut self, bulk: BulkConfig) -> Self {
        self.bulk = bulk;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<f64>,
    defaults: Option<EndpointDefaults>,
    bulk: Option<RawBulkConfig>,
}

#[derive(Debug, Deserialize)]
struct RawBulkConfig {
    max_retries: Option<u32>,
    poll_interval: Option<f64>,
}

/// Parses a base URL, forcing a trailing slash so relative endpoints join
/// under it rather than replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })
}

fn parse_timeout(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })?;
    seconds(name, secs)
}

fn seconds(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
        name,
        value: secs.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionValue;

    #[test]
    fn defaults_match_published_configuration() {
        let config = IpqsConfig::new("test-key").unwrap();

        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.defaults.ip.get("strictness"), Some(&OptionValue::Int(1)));
        assert_eq!(config.defaults.email.get("timeout"), Some(&OptionValue::Int(7)));
        assert!(config.defaults.phone.is_empty());
        assert_eq!(config.bulk.max_retries, 6);
        assert_eq!(config.bulk.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn rejects_blank_api_key() {
        assert!(matches!(IpqsConfig::new("  "), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = IpqsConfig::new("k")
            .unwrap()
            .with_base_url("http://127.0.0.1:8080/api/json")
            .unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/api/json/");
    }

    #[test]
    fn loads_json_document() {
        let config = IpqsConfig::from_json_str(
            r#"{
                "api_key": "json-key",
                "timeout": 2.5,
                "defaults": {"phone": {"country_code": "US"}},
                "bulk": {"max_retries": 3, "poll_interval": 0.5}
            }"#,
        )
        .unwrap();

        assert_eq!(config.api_key, "json-key");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(
            config.defaults.phone.get("country_code"),
            Some(&OptionValue::Str("US".into()))
        );
        assert_eq!(config.defaults.email.get("timeout"), Some(&OptionValue::Int(7)));
        assert_eq!(config.bulk.max_retries, 3);
        assert_eq!(config.bulk.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn json_without_key_is_rejected() {
        assert!(matches!(
            IpqsConfig::from_json_str(r#"{"timeout": 1}"#),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn negative_timeout_is_rejected() {
        assert!(matches!(
            parse_timeout("IPQS_TIMEOUT", "-1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(parse_timeout("IPQS_TIMEOUT", "abc").is_err());
    }
}
