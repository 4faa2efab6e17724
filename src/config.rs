//! Configuration for conbridge.
//!
//! Loaded from `~/.conbridge/config.toml`. Every field has a default, so a
//! missing or partial file is fine:
//!
//! ```toml
//! title = "Service console"
//! preface = "Type 'help' for commands"
//! lock_close = true
//!
//! [capture]
//! enabled = true
//! file_name = "console.log"
//!
//! [placement]
//! mode = "specific-monitor"   # default, follow-owner-window, specific-monitor
//! monitor = 1
//!
//! [reader]
//! retry_backoff_ms = 100
//! ```

use std::fs;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::core::session::CAPTURE_FILE_NAME;
use crate::placement::ConsolePositionMode;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Console window title
    pub title: Option<String>,
    /// Line shown before the first prompt
    pub preface: Option<String>,
    /// Disable the console close button while running
    pub lock_close: bool,
    pub capture: CaptureConfig,
    pub placement: PlacementConfig,
    pub reader: ReaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: None,
            preface: None,
            lock_close: true,
            capture: CaptureConfig::default(),
            placement: PlacementConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    /// Saved next to the executable
    pub file_name: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_name: CAPTURE_FILE_NAME.to_string(),
        }
    }
}

/// Window placement settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub mode: ConsolePositionMode,
    /// Used by `specific-monitor`; out of range falls back to monitor 0
    pub monitor: usize,
}

/// Reader worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub retry_backoff_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { retry_backoff_ms: 100 }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path, falling back to defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring invalid config {}: {}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        match Self::get_config_path() {
            Some(path) => self.save_to(&path),
            None => Err("Could not determine config path".to_string()),
        }
    }

    /// Save to an explicit path
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Write the defaults on first run so there is a file to edit
    pub fn save_default_if_missing() {
        if let Some(path) = Self::get_config_path() {
            if !path.exists() {
                if let Err(e) = Self::default().save() {
                    tracing::warn!("{}", e);
                }
            }
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }
}

/// `~/.conbridge`, created on first use
pub fn config_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".conbridge");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.lock_close);
        assert!(!config.capture.enabled);
        assert_eq!(config.capture.file_name, "console.log");
        assert_eq!(config.placement.mode, ConsolePositionMode::Default);
        assert_eq!(config.reader.retry_backoff_ms, 100);
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            preface = "hello"

            [capture]
            enabled = true

            [placement]
            mode = "specific-monitor"
            monitor = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.preface.as_deref(), Some("hello"));
        assert!(config.capture.enabled);
        assert_eq!(config.capture.file_name, "console.log");
        assert_eq!(config.placement.mode, ConsolePositionMode::SpecificMonitor);
        assert_eq!(config.placement.monitor, 2);
        assert_eq!(config.reader.retry_backoff_ms, 100);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.title = Some("Build console".to_string());
        config.lock_close = false;
        config.capture.enabled = true;
        config.capture.file_name = "session.log".to_string();
        config.placement.mode = ConsolePositionMode::FollowOwnerWindow;
        config.placement.monitor = 1;
        config.reader.retry_backoff_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.title.as_deref(), Some("Build console"));
        assert_eq!(loaded.preface, None);
        assert!(!loaded.lock_close);
        assert!(loaded.capture.enabled);
        assert_eq!(loaded.capture.file_name, "session.log");
        assert_eq!(loaded.placement.mode, ConsolePositionMode::FollowOwnerWindow);
        assert_eq!(loaded.placement.monitor, 1);
        assert_eq!(loaded.reader.retry_backoff_ms, 250);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("config.toml");
        assert!(Config::default().save_to(&path).is_err());
    }

    #[test]
    fn test_load_from_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "lock_close = \"not a bool\"").unwrap();
        let config = Config::load_from(&path);
        assert!(config.lock_close);

        assert!(!Config::load_from(&dir.path().join("missing.toml")).capture.enabled);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.title = Some("ops".into());
        config.placement.mode = ConsolePositionMode::FollowOwnerWindow;
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("mode = \"follow-owner-window\""));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.title.as_deref(), Some("ops"));
    }
}
