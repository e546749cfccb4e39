use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Persistent home of the widget settings.
pub trait ConfigStore: Send + Sync {
    /// Read the settings, writing defaults first when the file is missing.
    fn load(&self) -> Result<AppConfig, DomainError>;

    /// Write the settings back.
    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    /// Location of the settings file.
    fn config_path(&self) -> PathBuf;

    /// Directory receiving rotated log files.
    fn logs_dir(&self) -> PathBuf;
}
