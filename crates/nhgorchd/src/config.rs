//! Configuration file support for nhgorchd
//!
//! Loads and validates nhgorchd configuration from TOML files.
//! Default location: /etc/sonic/nhgorchd.conf

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Hardware group capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Overrides the switch-reported maximum; 0 asks the switch
    #[serde(default)]
    pub max_nhg_count: u32,

    /// Used when the switch cannot report a maximum
    #[serde(default = "default_max_nhg_count")]
    pub default_max_nhg_count: u32,
}

/// Event loop tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Maximum entries drained from one table per pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Interval of the periodic pass over deferred work, in milliseconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Depth of the intent channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete nhgorchd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NhgOrchConfig {
    #[serde(default)]
    pub capacity: CapacityConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_nhg_count() -> u32 {
    128
}

fn default_batch_size() -> usize {
    128
}

fn default_heartbeat_interval() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            max_nhg_count: 0,
            default_max_nhg_count: default_max_nhg_count(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl NhgOrchConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "nhgorchd: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default("/etc/sonic/nhgorchd.conf")
    }

    /// Capacity to use given what the switch reports.
    pub fn effective_capacity(&self, reported: Option<u32>) -> usize {
        let max = match (self.capacity.max_nhg_count, reported) {
            (0, Some(reported)) if reported > 0 => reported,
            (0, _) => self.capacity.default_max_nhg_count,
            (configured, _) => configured,
        };
        max as usize
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.heartbeat_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity.default_max_nhg_count == 0 {
            return Err(ConfigError::Configuration(
                "default_max_nhg_count must be > 0".to_string(),
            ));
        }

        if self.daemon.batch_size == 0 {
            return Err(ConfigError::Configuration(
                "batch_size must be > 0".to_string(),
            ));
        }

        if self.daemon.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Configuration(
                "heartbeat_interval_ms must be > 0".to_string(),
            ));
        }

        if self.daemon.channel_capacity == 0 {
            return Err(ConfigError::Configuration(
                "channel_capacity must be > 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Configuration(format!(
                "unknown log level {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = NhgOrchConfig::default();
        assert_eq!(config.capacity.max_nhg_count, 0);
        assert_eq!(config.capacity.default_max_nhg_count, 128);
        assert_eq!(config.daemon.batch_size, 128);
        assert_eq!(config.logging.format, LogFormat::Plain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_capacity() {
        let mut config = NhgOrchConfig::default();
        assert_eq!(config.effective_capacity(Some(512)), 512);
        assert_eq!(config.effective_capacity(Some(0)), 128);
        assert_eq!(config.effective_capacity(None), 128);

        config.capacity.max_nhg_count = 16;
        assert_eq!(config.effective_capacity(Some(512)), 16);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NhgOrchConfig::default();
        config.daemon.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = NhgOrchConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[capacity]
max_nhg_count = 512

[logging]
format = "json"
"#;
        let config: NhgOrchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.capacity.max_nhg_count, 512);
        assert_eq!(config.logging.format, LogFormat::Json);
        // Unspecified values should use defaults
        assert_eq!(config.capacity.default_max_nhg_count, 128);
        assert_eq!(config.daemon.heartbeat_interval_ms, 1000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[daemon]\nbatch_size = 32").unwrap();

        let config = NhgOrchConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.daemon.batch_size, 32);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[daemon\nbatch_size = ").unwrap();

        assert!(matches!(
            NhgOrchConfig::load_or_default(file.path()),
            Err(ConfigError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = NhgOrchConfig::load_or_default("/nonexistent/nhgorchd.conf").unwrap();
        assert_eq!(config, NhgOrchConfig::default());
    }
}
