//! # Configuration Management
//!
//! Centralized configuration for the codec, the persistence layer and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - `MQTT_WIRE_*` environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Example
//! ```toml
//! [codec]
//! max_packet_size = 262144
//! ring_buffer_capacity = 1048576
//!
//! [persistence.backend]
//! kind = "durable"
//! path = "/var/lib/broker/store"
//!
//! [logging]
//! log_level = "debug"
//! json_format = true
//! ```

use crate::core::codec::MAX_PACKET_SIZE;
use crate::core::header::MAX_HEADER_LEN;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default largest accepted frame (256 KB)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 256 * 1024;

/// Default ring buffer size (1 MB)
pub const DEFAULT_RING_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct WireConfig {
    /// Framing limits and send buffer sizing
    #[serde(default)]
    pub codec: CodecConfig,

    /// Store backend selection
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WireConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Recognised: `MQTT_WIRE_MAX_PACKET_SIZE`, `MQTT_WIRE_RING_BUFFER_CAPACITY`,
    /// `MQTT_WIRE_STORE_PATH` (selects the durable backend), `MQTT_WIRE_LOG_LEVEL`
    /// and `MQTT_WIRE_LOG_JSON`. Values that fail to parse are reported as
    /// `ConfigError`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(size) = var("MQTT_WIRE_MAX_PACKET_SIZE") {
            config.codec.max_packet_size = parse_var("MQTT_WIRE_MAX_PACKET_SIZE", &size)?;
        }

        if let Some(capacity) = var("MQTT_WIRE_RING_BUFFER_CAPACITY") {
            config.codec.ring_buffer_capacity =
                parse_var("MQTT_WIRE_RING_BUFFER_CAPACITY", &capacity)?;
        }

        if let Some(path) = var("MQTT_WIRE_STORE_PATH") {
            config.persistence.backend = BackendKind::Durable {
                path: PathBuf::from(path),
            };
        }

        if let Some(level) = var("MQTT_WIRE_LOG_LEVEL") {
            config.logging.log_level = parse_var("MQTT_WIRE_LOG_LEVEL", &level)?;
        }

        if let Some(json) = var("MQTT_WIRE_LOG_JSON") {
            config.logging.json_format = parse_var("MQTT_WIRE_LOG_JSON", &json)?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.codec.validate());
        errors.extend(self.persistence.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid value for {name}: '{value}'")))
}

/// Codec configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CodecConfig {
    /// Largest frame (fixed header included) the stream codec accepts
    pub max_packet_size: usize,

    /// Capacity of the outbound ring buffer in bytes
    pub ring_buffer_capacity: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            ring_buffer_capacity: DEFAULT_RING_BUFFER_CAPACITY,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_packet_size < MAX_HEADER_LEN {
            errors.push(format!(
                "Max packet size too small: {} (minimum: {MAX_HEADER_LEN})",
                self.max_packet_size
            ));
        } else if self.max_packet_size > MAX_PACKET_SIZE {
            errors.push(format!(
                "Max packet size too large: {} (protocol maximum: {MAX_PACKET_SIZE})",
                self.max_packet_size
            ));
        }

        if self.ring_buffer_capacity == 0 {
            errors.push("Ring buffer capacity must be greater than 0".to_string());
        } else if self.ring_buffer_capacity < self.max_packet_size {
            // frames larger than the ring can be decoded but never sent
            errors.push(format!(
                "WARNING: Ring buffer capacity {} is smaller than max packet size {}",
                self.ring_buffer_capacity, self.max_packet_size
            ));
        }

        errors
    }
}

/// Store backend selected at construction
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile in-process store
    #[default]
    Memory,
    /// fjall database rooted at `path`
    Durable { path: PathBuf },
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: BackendKind,
}

impl PersistenceConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let BackendKind::Durable { path } = &self.backend {
            if path.as_os_str().is_empty() {
                errors.push("Durable store path cannot be empty".to_string());
            } else if path.is_file() {
                errors.push(format!(
                    "Durable store path is a file, expected a directory: {}",
                    path.display()
                ));
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mqtt-wire"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
