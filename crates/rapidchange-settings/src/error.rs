//! Error types for the settings crate.
//!
//! This module provides structured error types for settings persistence,
//! numbered setting access, and configuration validation.

use rapidchange_core::Axis;
use std::io;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// The settings file format is not supported.
    #[error("Unsupported settings format: {0}")]
    UnsupportedFormat(String),

    /// A numbered setting does not exist.
    #[error("Unknown setting ${0}")]
    UnknownSetting(u16),

    /// A setting value could not be applied.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The settings directory could not be resolved.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// A configuration validation error occurred.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while validating settings into a configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric value is outside its valid range.
    #[error("Value out of range for '{key}': {value}")]
    ValueOutOfRange { key: String, value: String },

    /// Z heights do not stack the way the sequence expects.
    #[error("Inconsistent Z heights: {0}")]
    InconsistentHeights(String),

    /// Tool recognition is enabled but its sensor port is not available.
    #[error("Tool recognition enabled without an available sensor port ({port:?})")]
    RecognitionPortUnavailable { port: Option<u8> },

    /// The dust cover is port driven but its output port is not available.
    #[error("Dust cover output port not available ({port:?})")]
    DustCoverPortUnavailable { port: Option<u8> },

    /// The dust cover cannot be driven by a linear axis.
    #[error("Dust cover cannot be driven by axis {0}; use A, B or C")]
    InvalidDustCoverAxis(Axis),
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Result type alias for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::UnknownSetting(999);
        assert_eq!(err.to_string(), "Unknown setting $999");

        let err = SettingsError::InvalidSetting {
            key: "$902".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid setting '$902': not a number");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::RecognitionPortUnavailable { port: None };
        assert_eq!(
            err.to_string(),
            "Tool recognition enabled without an available sensor port (None)"
        );

        let err = ConfigError::InvalidDustCoverAxis(Axis::Z);
        assert_eq!(err.to_string(), "Dust cover cannot be driven by axis Z; use A, B or C");
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::InconsistentHeights("traverse below engage".to_string());
        let settings_err: SettingsError = config_err.into();
        assert!(matches!(settings_err, SettingsError::Config(_)));

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let settings_err: SettingsError = io_err.into();
        assert!(matches!(settings_err, SettingsError::IoError(_)));
    }
}
