//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub historian: HistorianConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Historian data source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorianConfig {
    /// Base URL of the historian; empty means unset
    #[serde(default)]
    pub base_url: String,

    /// Tag used when neither the query nor the caller names one
    #[serde(default)]
    pub default_tag: Option<String>,

    #[serde(default = "default_instant_timeout")]
    pub instant_timeout_secs: u64,

    #[serde(default = "default_historical_timeout")]
    pub historical_timeout_secs: u64,

    /// Passed through for logging; reads are never retried
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Run instant and historical legs for declarative queries
    #[serde(default = "default_dual_mode")]
    pub dual_mode: bool,
}

fn default_instant_timeout() -> u64 {
    10
}

fn default_historical_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_dual_mode() -> bool {
    true
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_tag: None,
            instant_timeout_secs: default_instant_timeout(),
            historical_timeout_secs: default_historical_timeout(),
            retry_count: default_retry_count(),
            dual_mode: default_dual_mode(),
        }
    }
}

impl HistorianConfig {
    /// Default tag, ignoring blank values
    pub fn default_tag(&self) -> Option<&str> {
        self.default_tag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8086
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
    pub fn init_subscriber(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("tagwire={},tower_http=info", self.level)));

        let registry = tracing_subscriber::registry().with(filter);
        if self.format.eq_ignore_ascii_case("json") {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tagwire").join("config.toml")),
            Some(PathBuf::from("/etc/tagwire/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Historian overrides
        if let Some(url) = lookup("TAGWIRE_HISTORIAN_URL") {
            self.historian.base_url = url;
        }
        if let Some(tag) = lookup("TAGWIRE_DEFAULT_TAG") {
            self.historian.default_tag = Some(tag);
        }
        if let Some(secs) = lookup("TAGWIRE_INSTANT_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.historian.instant_timeout_secs = secs;
        }
        if let Some(secs) = lookup("TAGWIRE_HISTORICAL_TIMEOUT_SECS").and_then(|s| s.parse().ok())
        {
            self.historian.historical_timeout_secs = secs;
        }

        // API overrides
        if let Some(host) = lookup("TAGWIRE_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("TAGWIRE_API_PORT").and_then(|s| s.parse().ok()) {
            self.api.port = port;
        }

        // Logging overrides
        if let Some(level) = lookup("TAGWIRE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TAGWIRE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tagwire Configuration
#
# Environment variables override these settings:
# - TAGWIRE_HISTORIAN_URL
# - TAGWIRE_DEFAULT_TAG
# - TAGWIRE_INSTANT_TIMEOUT_SECS
# - TAGWIRE_HISTORICAL_TIMEOUT_SECS
# - TAGWIRE_API_HOST
# - TAGWIRE_API_PORT
# - TAGWIRE_LOG_LEVEL
# - TAGWIRE_LOG_FORMAT

[historian]
# Base URL of the historian (reads go to <base_url>/pi/trn)
base_url = "http://localhost:8080"

# Tag used when a query names none
# default_tag = "Boiler.Temperature"

# Timeout for the latest-value read (seconds)
instant_timeout_secs = 10

# Timeout for the ranged read (seconds)
historical_timeout_secs = 30

# Retry hint for callers; reads are attempted once
retry_count = 3

# Merge a latest-value read into every declarative query
dual_mode = true

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8086

# Allowed CORS origins (empty allows any)
cors_origins = []

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.historian.base_url.is_empty());
        assert_eq!(config.historian.instant_timeout_secs, 10);
        assert_eq!(config.historian.historical_timeout_secs, 30);
        assert_eq!(config.historian.retry_count, 3);
        assert!(config.historian.dual_mode);
        assert_eq!(config.api.addr(), "0.0.0.0:8086");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.historian.base_url, "http://localhost:8080");
        assert_eq!(config.historian.default_tag, None);
        assert_eq!(config.api.port, 8086);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[historian]\nbase_url = \"http://pi.plant\"\ndefault_tag = \"T1\"\ndual_mode = false"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.historian.base_url, "http://pi.plant");
        assert_eq!(config.historian.default_tag(), Some("T1"));
        assert!(!config.historian.dual_mode);
        assert_eq!(config.historian.historical_timeout_secs, 30);
        assert_eq!(config.api.port, 8086);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[historian\nbase_url = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TAGWIRE_HISTORIAN_URL", "http://override"),
            ("TAGWIRE_DEFAULT_TAG", "T9"),
            ("TAGWIRE_INSTANT_TIMEOUT_SECS", "3"),
            ("TAGWIRE_HISTORICAL_TIMEOUT_SECS", "not-a-number"),
            ("TAGWIRE_API_PORT", "9000"),
            ("TAGWIRE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.historian.base_url, "http://override");
        assert_eq!(config.historian.default_tag(), Some("T9"));
        assert_eq!(config.historian.instant_timeout_secs, 3);
        assert_eq!(config.historian.historical_timeout_secs, 30);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_blank_default_tag_is_unset() {
        let config = HistorianConfig {
            default_tag: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.default_tag(), None);
    }
}
