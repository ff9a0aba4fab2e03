//! RapidChange Settings Crate
//!
//! Handles the ATC settings record, its validation into a typed
//! configuration, numbered `$9xx` settings, and file persistence.

pub mod config;
pub mod error;
pub mod persistence;
pub mod registry;

pub use config::{
    Alignment, AtcConfig, AtcSettings, Direction, DustCoverKind, DustCoverMode, PortMap,
    ToolRecognitionConfig, ToolSetterConfig,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
pub use persistence::SettingsStore;
pub use registry::{SettingDescriptor, SettingFormat, SettingValue, SettingsRegistry};
