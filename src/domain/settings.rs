use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::command::DEFAULT_MAX_COMMAND_LEN;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "metawear".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Largest command accepted by the encoder, header included.
    #[serde(default = "default_max_command_len")]
    pub max_command_len: usize,
    /// `None` disables the per-operation watchdog.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: Option<u64>,

    #[serde(default)]
    pub known_devices: Vec<String>,
    #[serde(default)]
    pub last_connected_device: Option<String>,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_command_len: default_max_command_len(),
            operation_timeout_ms: default_operation_timeout_ms(),
            known_devices: Vec::new(),
            last_connected_device: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_max_command_len() -> usize {
    DEFAULT_MAX_COMMAND_LEN
}
fn default_operation_timeout_ms() -> Option<u64> {
    Some(5000)
}

/// Runtime knobs handed to a board connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub max_command_len: usize,
    pub operation_timeout: Option<Duration>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig::from(&Settings::default())
    }
}

impl From<&Settings> for BoardConfig {
    fn from(s: &Settings) -> Self {
        Self {
            max_command_len: s.max_command_len,
            operation_timeout: s.operation_timeout_ms.map(Duration::from_millis),
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Settings stored at an explicit path. Missing or unreadable files
    /// yield defaults.
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("MetaWear");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn board_config(&self) -> BoardConfig {
        BoardConfig::from(&self.settings)
    }

    /// Remember `device` and make it the last connected one.
    pub fn remember_device(&mut self, device: &str) -> anyhow::Result<()> {
        if !self.settings.known_devices.iter().any(|d| d == device) {
            self.settings.known_devices.push(device.to_string());
        }
        self.settings.last_connected_device = Some(device.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("metawear-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.max_command_len, 20);
        assert_eq!(s.operation_timeout_ms, Some(5000));
        assert_eq!(s.log_settings.level, "info");

        let s: Settings = serde_json::from_str(r#"{"operation_timeout_ms": null}"#).unwrap();
        assert_eq!(BoardConfig::from(&s).operation_timeout, None);
    }

    #[test]
    fn test_board_config_from_settings() {
        let config = BoardConfig::default();
        assert_eq!(config.max_command_len, DEFAULT_MAX_COMMAND_LEN);
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_path("reload");
        let mut service = SettingsService::with_path(path.clone());
        service.remember_device("C5:1A:2B:3C:4D:5E").unwrap();
        service.remember_device("C5:1A:2B:3C:4D:5E").unwrap();

        let reloaded = SettingsService::with_path(path.clone());
        assert_eq!(reloaded.get().known_devices.len(), 1);
        assert_eq!(
            reloaded.get().last_connected_device.as_deref(),
            Some("C5:1A:2B:3C:4D:5E")
        );
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        fs::write(&path, "not json").unwrap();
        let service = SettingsService::with_path(path.clone());
        assert_eq!(service.get().max_command_len, DEFAULT_MAX_COMMAND_LEN);
        let _ = fs::remove_file(path);
    }
}
