use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

const APP_DIR: &str = "MeetClock";
const CONFIG_FILE: &str = "config.toml";

/// TOML-based configuration store.
pub struct TomlConfigStore {
    config_path: PathBuf,
    logs_dir: PathBuf,
}

impl TomlConfigStore {
    /// Store under the OS-specific configuration directory.
    /// - macOS: ~/Library/Application Support/MeetClock/
    /// - Windows: %APPDATA%\MeetClock\
    /// - Linux: ~/.config/MeetClock/
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = dirs::config_dir()
            .map(|p| p.join(APP_DIR))
            .ok_or_else(|| {
                DomainError::Config("Could not find application config directory".to_string())
            })?;

        let logs_dir = dirs::data_local_dir()
            .map(|p| p.join(APP_DIR).join("logs"))
            .unwrap_or_else(|| data_dir.join("logs"));

        Self::with_paths(data_dir.join(CONFIG_FILE), logs_dir)
    }

    /// Store backed by an explicit file; logs go next to it.
    pub fn at(config_path: PathBuf) -> Result<Self, DomainError> {
        let logs_dir = config_path
            .parent()
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));

        Self::with_paths(config_path, logs_dir)
    }

    fn with_paths(config_path: PathBuf, logs_dir: PathBuf) -> Result<Self, DomainError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!(config_path = ?config_path, logs_dir = ?logs_dir, "ConfigStore initialized");

        Ok(Self {
            config_path,
            logs_dir,
        })
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?self.config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?self.config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content)?;

        debug!(path = ?self.config_path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.logs_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    use crate::domain::config::Backoff;

    #[test]
    fn test_explicit_path_layout() {
        let temp_dir = env::temp_dir().join("meetclock_store_layout");
        let store = TomlConfigStore::at(temp_dir.join("settings.toml")).unwrap();

        assert!(store.config_path().ends_with("settings.toml"));
        assert_eq!(store.logs_dir(), temp_dir.join("logs"));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp_dir = env::temp_dir().join("meetclock_store_defaults");
        let _ = fs::remove_dir_all(&temp_dir);

        let store = TomlConfigStore::at(temp_dir.join(CONFIG_FILE)).unwrap();
        let config = store.load().unwrap();

        assert!(store.config_path().exists());
        assert_eq!(config.timer.presets, vec![60, 120]);

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = env::temp_dir().join("meetclock_store_roundtrip");
        let _ = fs::remove_dir_all(&temp_dir);

        let store = TomlConfigStore::at(temp_dir.join(CONFIG_FILE)).unwrap();

        let mut config = AppConfig::new();
        config.features.video_overlay = false;
        config.host.backoff = Backoff::Exponential;
        config.timer.default_audio_url = "https://cdn.example.com/gong.mp3".to_string();
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.features.video_overlay);
        assert_eq!(loaded.host.backoff, Backoff::Exponential);
        assert_eq!(
            loaded.timer.default_audio_url,
            "https://cdn.example.com/gong.mp3"
        );

        let _ = fs::remove_dir_all(&temp_dir);
    }
}
