pub mod validation;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Default upstream search endpoint.
pub const DEFAULT_UPSTREAM_ENDPOINT: &str = "https://you.com/api/streamingSearch";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Overall deadline in seconds for a buffered (non-streaming) upstream call.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            base_path: String::new(),
            http_use_env_proxy: false,
            proxy: None,
            runtime_worker_threads: None,
        }
    }
}

/// Upstream search API settings that feed the outbound query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_safe_search")]
    pub safe_search: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_endpoint() -> String {
    DEFAULT_UPSTREAM_ENDPOINT.to_string()
}
fn default_market() -> String {
    "zh-HK".to_string()
}
fn default_safe_search() -> String {
    "Moderate".to_string()
}
fn default_count() -> u32 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            market: default_market(),
            safe_search: default_safe_search(),
            count: default_count(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Close streams with a `finish_reason: "stop"` chunk and `data: [DONE]`.
    /// Off by default: the stream just ends when the upstream closes.
    #[serde(default)]
    pub stream_done_marker: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            stream_done_marker: false,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Extra or overriding client -> upstream model ids, merged over the
    /// built-in table.
    #[serde(default)]
    pub models: BTreeMap<String, String>,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the validated defaults.
///
/// # Errors
///
/// Same as [`load_config`] for every failure other than a missing file.
pub fn load_config_or_default(path: &str) -> Result<AppConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            validate_config(&config)?;
            Ok(config)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.timeout, 60);
        assert_eq!(config.upstream.endpoint, DEFAULT_UPSTREAM_ENDPOINT);
        assert_eq!(config.upstream.market, "zh-HK");
        assert!(!config.features.stream_done_marker);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default("does-not-exist.yaml").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.upstream.count, 10);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_field_defaults() {
        let yaml = "upstream:\n  market: en-US\nmodels:\n  my-model: gpt_4o\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.upstream.market, "en-US");
        assert_eq!(config.upstream.safe_search, "Moderate");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.models.get("my-model").map(String::as_str), Some("gpt_4o"));
    }

    #[test]
    fn test_example_documents_server_fields() {
        let example = std::fs::read_to_string("config.example.yaml").unwrap();
        for field in [
            "host:",
            "port:",
            "timeout:",
            "connect_timeout:",
            "base_path:",
            "http_use_env_proxy:",
            "proxy:",
            "runtime_worker_threads:",
        ] {
            assert!(example.contains(field), "config.example.yaml lacks {field}");
        }

        let yaml = "server:\n  runtime_worker_threads: 4\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.runtime_worker_threads, Some(4));
        assert!(validate_config(&config).is_ok());
    }
}
