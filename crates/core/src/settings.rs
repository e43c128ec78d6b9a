//! Optional per-plugin `Settings.json`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModforgeError, Result};

/// Settings file name inside a plugin directory.
pub const SETTINGS_FILE: &str = "Settings.json";

/// Minimum verbosity for a plugin's log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parses a level name. Unrecognized names fall back to `Debug`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "log" | "info" => LogLevel::Info,
            "warning" | "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(LogLevel::parse(&value))
    }
}

/// Plugin settings document.
///
/// Only `logLevel` is interpreted by the orchestrator; every other key is
/// preserved and handed to the plugin as part of its configuration JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSettings {
    #[serde(rename = "logLevel", default)]
    pub log_level: LogLevel,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PluginSettings {
    /// Loads settings from `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ModforgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ModforgeError::Settings {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Writes settings back to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_json();
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Serializes the full document, including unrecognized keys.
    pub fn to_json(&self) -> String {
        // A map of JSON values plus a string always serializes.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::parse("Log"), LogLevel::Info);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("trace"), LogLevel::Trace);
        assert_eq!(LogLevel::parse("loud"), LogLevel::Debug);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PluginSettings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_keeps_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"logLevel": "Warning", "speed": 3}"#).unwrap();

        let settings = PluginSettings::load(&path).unwrap().unwrap();
        assert_eq!(settings.log_level, LogLevel::Warn);
        assert_eq!(settings.extra.get("speed"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_default_level_when_field_absent() {
        let settings: PluginSettings = serde_json::from_str(r#"{"other": true}"#).unwrap();
        assert_eq!(settings.log_level, LogLevel::Info);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let mut settings = PluginSettings {
            log_level: LogLevel::Error,
            ..Default::default()
        };
        settings
            .extra
            .insert("name".to_string(), serde_json::json!("value"));
        settings.save(&path).unwrap();

        let reloaded = PluginSettings::load(&path).unwrap().unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(
            PluginSettings::load(&path),
            Err(ModforgeError::Settings { .. })
        ));
    }
}
