//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `synhome.toml` in the working directory, or at the path named
//! by `SYNHOME_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use synhome_adapter_mqtt::MqttConfig;
use synhome_adapter_virtual::VirtualConfig;
use synhome_adapter_websocket::WsConfig;
use synhome_domain::device::{CommandSink, DeviceConfig};
use synhome_domain::id::AdapterId;

const DEFAULT_PATH: &str = "synhome.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Configured devices, in dispatch order.
    pub devices: Vec<DeviceConfig>,
    /// Protocol adapters.
    pub adapters: Vec<AdapterConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One `[[adapters]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub id: AdapterId,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

/// Transport settings, selected by the `type` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Mqtt(Box<MqttConfig>),
    Websocket(Box<WsConfig>),
    Virtual(VirtualConfig),
}

impl Config {
    /// Load configuration from `SYNHOME_CONFIG` or `synhome.toml` (if
    /// present) then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// configuration is inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SYNHOME_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SYNHOME_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut device_ids = HashSet::new();
        for device in &self.devices {
            if !device_ids.insert(device.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "device {} is declared twice",
                    device.id
                )));
            }
        }

        let mut adapter_ids = HashSet::new();
        for adapter in &self.adapters {
            if adapter.id.is_blank() {
                return Err(ConfigError::Validation(
                    "adapter id must not be empty".to_string(),
                ));
            }
            if !adapter_ids.insert(&adapter.id) {
                return Err(ConfigError::Validation(format!(
                    "adapter {} is declared twice",
                    adapter.id
                )));
            }
        }

        for device in &self.devices {
            match &device.sink {
                CommandSink::Adapter { adapter_id, .. } if !adapter_ids.contains(adapter_id) => {
                    return Err(ConfigError::Validation(format!(
                        "device {} is bound to unknown adapter {adapter_id}",
                        device.id
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "synhomed=info,synhome=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
