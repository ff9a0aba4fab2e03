//! Settings Persistence
//!
//! Loads and saves the [`AtcSettings`] record as JSON or TOML, chosen by the
//! file extension. A missing file is restored to defaults and written back;
//! a file that exists but cannot be parsed is an error and is left as is.

use crate::config::{AtcConfig, AtcSettings, PortMap};
use crate::error::{SettingsError, SettingsResult};
use crate::registry::SettingsRegistry;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "rapidchange";
const SETTINGS_FILE: &str = "atc.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(FileFormat::Json),
            Some("toml") => Ok(FileFormat::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// File-backed settings record
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: AtcSettings,
}

impl SettingsStore {
    /// Default settings file in the user config directory
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no user config directory available".to_string())
        })?;
        Ok(dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Create a store holding defaults without touching the file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: AtcSettings::default(),
        }
    }

    /// Load settings from an existing file
    pub fn load(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let format = FileFormat::from_path(&path)?;
        let content = std::fs::read_to_string(&path)?;
        let settings = match format {
            FileFormat::Json => serde_json::from_str(&content)?,
            FileFormat::Toml => toml::from_str(&content)?,
        };
        tracing::debug!("Loaded ATC settings from {}", path.display());
        Ok(Self { path, settings })
    }

    /// Load settings, restoring defaults when the file does not exist yet
    pub fn load_or_restore(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => Ok(store),
            Err(SettingsError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No ATC settings at {}, restoring defaults",
                    path.display()
                );
                let mut store = Self::new(path);
                store.restore_defaults()?;
                Ok(store)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the current settings to the store's file
    pub fn save(&self) -> SettingsResult<()> {
        let content = match FileFormat::from_path(&self.path)? {
            FileFormat::Json => serde_json::to_string_pretty(&self.settings)?,
            FileFormat::Toml => toml::to_string_pretty(&self.settings)?,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)?;
        tracing::debug!("Saved ATC settings to {}", self.path.display());
        Ok(())
    }

    /// Reset every setting to its default and persist the result
    pub fn restore_defaults(&mut self) -> SettingsResult<()> {
        self.settings = AtcSettings::default();
        self.save()
    }

    /// Apply a `$n=value` line and persist it
    pub fn apply_line(&mut self, line: &str) -> SettingsResult<u16> {
        let id = SettingsRegistry::apply_line(&mut self.settings, line)?;
        self.save()?;
        Ok(id)
    }

    /// Validate the stored record against the controller's ports
    pub fn validated(&self, ports: &PortMap) -> SettingsResult<AtcConfig> {
        Ok(self.settings.validate(ports)?)
    }

    /// Settings file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings record
    pub fn settings(&self) -> &AtcSettings {
        &self.settings
    }

    /// Mutable settings record; call [`SettingsStore::save`] to persist
    pub fn settings_mut(&mut self) -> &mut AtcSettings {
        &mut self.settings
    }
}
