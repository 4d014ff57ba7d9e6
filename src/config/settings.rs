//! Configuration settings for the tracking daemon.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::TrackingError;
use crate::tracking::RedactionSentinel;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub socket: SocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Per-endpoint interceptor overrides, keyed by endpoint name.
    #[serde(default)]
    pub handlers: HashMap<String, HandlerOverrides>,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path to the Unix socket file.
    pub path: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
}

/// Request tracking configuration.
///
/// Field lengths bound what a log record may carry; records that exceed them
/// are rejected by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Maximum number of path characters kept in a record.
    #[serde(default = "default_field_length")]
    pub path_length: usize,
    /// Whether records are handed to the store at all.
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Maximum length of the caller identity label.
    #[serde(default = "default_field_length")]
    pub username_length: usize,
    /// Maximum length of the handler name.
    #[serde(default = "default_field_length")]
    pub handler_name_length: usize,
    /// Maximum length of the handler method label.
    #[serde(default = "default_field_length")]
    pub handler_method_length: usize,
}

/// Log record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON lines file records are appended to.
    #[serde(default = "default_store_log_path")]
    pub log_path: PathBuf,
}

/// Interceptor overrides for a single endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HandlerOverrides {
    /// Methods to log. Absent means every method is logged.
    #[serde(default)]
    pub logging_methods: Option<Vec<String>>,
    /// Additional sensitive keys (added to the built-in set).
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
    /// Replacement for redacted values. Must be a string.
    #[serde(default)]
    pub redaction_sentinel: Option<serde_json::Value>,
}

// Default value functions
fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576 // 1MB
}

fn default_max_concurrent() -> usize {
    100
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_field_length() -> usize {
    200
}

fn default_persist() -> bool {
    true
}

fn default_store_log_path() -> PathBuf {
    PathBuf::from("/var/log/api-tracking/requests.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_concurrent_requests: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            path_length: default_field_length(),
            persist: default_persist(),
            username_length: default_field_length(),
            handler_name_length: default_field_length(),
            handler_method_length: default_field_length(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_path: default_store_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrackingError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TrackingError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings = Self::from_toml(&content).map_err(|e| TrackingError::Config {
            message: format!("Invalid config file '{}': {}", path.display(), e),
        })?;

        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, TrackingError> {
        let settings: Settings = toml::from_str(content).map_err(|e| TrackingError::Config {
            message: format!("Failed to parse settings: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), TrackingError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(TrackingError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(TrackingError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        // Validate socket permissions format
        if u32::from_str_radix(&self.socket.permissions, 8).is_err() {
            return Err(TrackingError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0660')",
                    self.socket.permissions
                ),
            });
        }

        if self.tracking.path_length == 0 {
            return Err(TrackingError::config("tracking.path_length must be positive"));
        }

        // A sentinel that is not a string would leave values unredacted
        for (name, overrides) in &self.handlers {
            if let Some(sentinel) = &overrides.redaction_sentinel {
                RedactionSentinel::try_from(sentinel.clone()).map_err(|e| TrackingError::Config {
                    message: format!("handlers.{}: {}", name, e),
                })?;
            }
        }

        Ok(())
    }
}
