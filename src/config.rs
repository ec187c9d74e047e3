use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client configuration for the streaming layer.
///
/// All fields have sensible defaults; an empty TOML document yields a
/// working local-development configuration. Example in `quill.toml`:
/// ```toml
/// [http]
/// base_url = "https://workspace.example.com"
/// request_timeout_secs = 60
///
/// [sync]
/// settle_delay_ms = 300
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Backend origin, without a trailing slash (default: local dev server)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for unary requests in seconds (default: 30).
    /// Streaming requests apply this to response-header receipt only.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    /// Origin with any trailing slash removed, ready for path concatenation.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8420".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pause before the post-success confirmation fetch, in milliseconds
    /// (default: 300). Tolerates read-after-write lag between the terminal
    /// stream event and the persisted job record.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl SyncConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_settle_delay() -> u64 {
    300
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Attach a generated clientId query parameter to the event channel
    /// subscription (default: true)
    #[serde(default = "default_correlate_events")]
    pub correlate_events: bool,
}

fn default_correlate_events() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            correlate_events: default_correlate_events(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.request_timeout_secs, 30);
        assert_eq!(config.sync.settle_delay_ms, 300);
        assert!(config.rpc.correlate_events);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.sync.settle_delay_ms, 300);
        assert_eq!(config.http.base_url, default_base_url());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = Config::from_toml_str(
            r#"
            [http]
            base_url = "https://workspace.example.com/"
            request_timeout_secs = 60

            [sync]
            settle_delay_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.http.origin(), "https://workspace.example.com");
        assert_eq!(config.http.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.sync.settle_delay(), Duration::from_millis(50));
        assert!(config.rpc.correlate_events);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(Config::from_toml_str("[http\nbase_url = 3").is_err());
    }
}
