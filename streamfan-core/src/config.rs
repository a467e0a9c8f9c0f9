use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub source: SourceConfig,
    pub redis: RedisConfig,
    pub registry: RegistryConfig,
    pub checkpoint: CheckpointConfig,
    pub delivery: DeliveryConfig,
    pub poller: PollerConfig,
    pub timeouts: TimeoutsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Stream listing / description API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL; stream descriptions are fetched from `{api_base_url}{name}`
    pub api_base_url: String,
    pub auth_token: Option<String>,
    /// Header the auth token is sent in
    pub auth_header: String,
    /// Fixed delay between discovery attempts while the listing is unreachable
    pub discovery_retry_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            auth_token: None,
            auth_header: "auth_token".to_string(),
            discovery_retry_seconds: 30,
        }
    }
}

/// Partitioned record source (Kinesis-compatible JSON API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub auth_token: Option<String>,
    /// Max records per read call
    pub batch_limit: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth_token: None,
            batch_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "streamfan:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Key namespace for subscriber entries
    pub table: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            table: "webhooks".to_string(),
        }
    }
}

/// Where checkpoint snapshots live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackendKind {
    #[default]
    Redis,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackendKind,
    /// Partition/sort key reserved for the snapshot
    pub state_key: String,
    /// Snapshot path for the file backend
    pub file_path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackendKind::Redis,
            state_key: "STREAMS_STATE".to_string(),
            file_path: "streams.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Upper bound on retry deliveries executing at the same time
    pub max_concurrent_retries: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_retries: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Sleep between poll cycles
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub http_seconds: u64,
    pub redis_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            http_seconds: 30,
            redis_seconds: 5,
        }
    }
}

/// Registration endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // STREAMFAN_CATALOG__API_BASE_URL, STREAMFAN_SOURCE__BATCH_LIMIT, ...
        builder = builder.add_source(
            Environment::with_prefix("STREAMFAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the whole config and report every problem at once
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.catalog.api_base_url.is_empty() {
            errors.push("catalog.api_base_url must be set".to_string());
        } else if !is_http_url(&self.catalog.api_base_url) {
            errors.push(format!(
                "catalog.api_base_url is not an http(s) URL: {}",
                self.catalog.api_base_url
            ));
        }

        if self.source.endpoint.is_empty() {
            errors.push("source.endpoint must be set".to_string());
        } else if !is_http_url(&self.source.endpoint) {
            errors.push(format!(
                "source.endpoint is not an http(s) URL: {}",
                self.source.endpoint
            ));
        }

        if self.source.batch_limit == 0 || self.source.batch_limit > 10_000 {
            errors.push("source.batch_limit must be between 1 and 10000".to_string());
        }

        if self.checkpoint.state_key.is_empty() {
            errors.push("checkpoint.state_key must not be empty".to_string());
        }

        if self.checkpoint.backend == CheckpointBackendKind::File
            && self.checkpoint.file_path.is_empty()
        {
            errors.push("checkpoint.file_path must be set for the file backend".to_string());
        }

        if self.delivery.max_concurrent_retries == 0 {
            errors.push("delivery.max_concurrent_retries must be at least 1".to_string());
        }

        if self.timeouts.http_seconds == 0 || self.timeouts.redis_seconds == 0 {
            errors.push("timeouts must be at least one second".to_string());
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got {}",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[must_use]
    pub fn discovery_retry_delay(&self) -> Duration {
        Duration::from_secs(self.catalog.discovery_retry_seconds)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poller.interval_ms)
    }

    /// Get registration server address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn is_http_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            catalog: CatalogConfig {
                api_base_url: "https://streams.example.com/streams/".to_string(),
                ..CatalogConfig::default()
            },
            source: SourceConfig {
                endpoint: "https://kinesis.example.com".to_string(),
                ..SourceConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.catalog.discovery_retry_seconds, 30);
        assert_eq!(config.catalog.auth_header, "auth_token");
        assert_eq!(config.source.batch_limit, 100);
        assert_eq!(config.checkpoint.backend, CheckpointBackendKind::Redis);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.discovery_retry_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("catalog.api_base_url")));
        assert!(errors.iter().any(|e| e.contains("source.endpoint")));
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_file_backend_requires_path() {
        let mut config = valid_config();
        config.checkpoint.backend = CheckpointBackendKind::File;
        config.checkpoint.file_path = String::new();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("file_path"));
    }

    #[test]
    fn test_http_address() {
        let mut config = valid_config();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9000;

        assert_eq!(config.http_address(), "127.0.0.1:9000");
    }
}
