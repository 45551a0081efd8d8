use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// Tunable parameters of the streaming engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Bounded sleep between worker polls, in milliseconds
    pub poll_interval_ms: u64,
    /// How many extra chunk requests a starved buffer slot is granted
    pub buffer_retries: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            buffer_retries: 2,
        }
    }
}

impl StreamSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values that would make the worker spin or stall
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval_ms > 1000 {
            return Err(ConfigError::InvalidSetting(format!(
                "poll_interval_ms {} is too coarse for buffer rotation (max 1000)",
                self.poll_interval_ms
            )));
        }
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct SettingsManager {
    settings: StreamSettings,
    settings_path: PathBuf,
}

impl SettingsManager {
    pub fn new() -> Result<Self, ConfigError> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_settings(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    pub fn get_settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn update_settings<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut StreamSettings),
    {
        updater(&mut self.settings);
        self.settings.validate()?;
        self.save_settings()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = StreamSettings::default();
        self.save_settings()
    }

    fn get_settings_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("sound-stream");

        std::fs::create_dir_all(&config_dir).map_err(ConfigError::IoError)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_settings(path: &Path) -> Result<StreamSettings, ConfigError> {
        if !path.exists() {
            return Ok(StreamSettings::default());
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let settings: StreamSettings =
            toml::from_str(&content).map_err(ConfigError::DeserializationError)?;
        settings.validate()?;

        Ok(settings)
    }

    fn save_settings(&self) -> Result<(), ConfigError> {
        // Ensure the parent directory exists
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::IoError)?;
        }

        let content =
            toml::to_string_pretty(&self.settings).map_err(ConfigError::SerializationError)?;

        std::fs::write(&self.settings_path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }
}
