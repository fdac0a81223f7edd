//! Persisted driver settings
//!
//! Stored as JSON, by default in `~/.config/openskydimo/config.json`:
//!
//! ```json
//! { "serial-port": "/dev/ttyUSB0", "led-count": 30, "baud-rate": 115200 }
//! ```
//!
//! Missing fields take their defaults. The daemon reads the file once at
//! startup and writes it back on graceful shutdown.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Baud rate used when nothing else is configured
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Largest LED count the strip protocol can address
pub const MAX_LED_COUNT: usize = 255;

/// Settings needed to bring a strip back after a restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DriverConfig {
    /// Serial device path; empty means unconfigured
    #[serde(default)]
    pub serial_port: String,
    /// Number of LEDs on the strip; 0 means unconfigured
    #[serde(default)]
    pub led_count: usize,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            serial_port: String::new(),
            led_count: 0,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl DriverConfig {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("openskydimo")
            .join("config.json")
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.led_count > MAX_LED_COUNT {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: format!(
                    "led-count {} exceeds {}",
                    config.led_count, MAX_LED_COUNT
                ),
            });
        }
        Ok(config)
    }

    /// Load from a file, falling back to defaults if it is missing or broken
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Save to a JSON file, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }
}
