//! Settings file loading for storesync.
//!
//! Settings are loaded from a TOML file (default: `storesync.toml`). Every
//! field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storesync_core::{HandshakePolicy, DEFAULT_MAX_ATTEMPTS};

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "storesync.toml";

/// Root settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Handshake retry settings.
    #[serde(default)]
    pub handshake: HandshakeSettings,
    /// Logging settings.
    #[serde(default)]
    pub log: LogSettings,
}

/// Handshake retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeSettings {
    /// Pings sent before giving up (default: 15).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait after the first ping in milliseconds (default: 10).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the wait between pings in milliseconds (default: 1000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound on random extra wait in milliseconds (default: 0).
    #[serde(default)]
    pub jitter_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: 0,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl HandshakeSettings {
    /// Convert into the retry policy used by the handshake driver.
    pub fn policy(&self) -> HandshakePolicy {
        HandshakePolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

impl Settings {
    /// Load and validate settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "handshake.max_attempts must be at least 1".into(),
            ));
        }
        if self.handshake.base_delay_ms > self.handshake.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "handshake.base_delay_ms ({}) exceeds handshake.max_delay_ms ({})",
                self.handshake.base_delay_ms, self.handshake.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings file {path}: {source}")]
    ReadError {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse settings file.
    #[error("failed to parse settings file {path}: {source}")]
    ParseError {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to parse inline settings.
    #[error("failed to parse settings: {0}")]
    Syntax(#[from] toml::de::Error),
    /// Failed to render settings.
    #[error("failed to render settings: {0}")]
    Render(#[from] toml::ser::Error),
    /// A value is out of range.
    #[error("invalid settings: {0}")]
    Invalid(String),
}
