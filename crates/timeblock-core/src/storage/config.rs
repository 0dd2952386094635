//! TOML-based application configuration.
//!
//! Stores:
//! - Block length, break length and horizon for the scheduler
//! - The default user and their UTC offset
//! - The busy timeout applied to commits
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::scheduler::{SchedulerConfig, BREAK_MINUTES, MAX_BLOCK_MINUTES};
use crate::schedule::{offset_from_minutes, parse_utc_offset};
use crate::timeline::DEFAULT_HORIZON_DAYS;

/// Scheduler-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_max_block_minutes")]
    pub max_block_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    /// User the CLI acts for unless `--user` is given.
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// User timezone as `±HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// How long a commit waits for a locked database (milliseconds).
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,
}

// Default functions
fn default_max_block_minutes() -> u32 {
    MAX_BLOCK_MINUTES
}
fn default_break_minutes() -> u32 {
    BREAK_MINUTES
}
fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}
fn default_user_id() -> String {
    "local".into()
}
fn default_utc_offset() -> String {
    "+00:00".into()
}
fn default_commit_timeout_ms() -> u64 {
    5000
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_block_minutes: default_max_block_minutes(),
            break_minutes: default_break_minutes(),
            horizon_days: default_horizon_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSection::default(),
            user_id: default_user_id(),
            utc_offset: default_utc_offset(),
            commit_timeout_ms: default_commit_timeout_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".to_string(),
        };
        let bad_value = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| bad_value(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| bad_value(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(bad_value("cannot assign to a section".to_string()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("."),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value has the wrong type
    /// or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, err: ValidationError| ConfigError::InvalidValue {
            key: key.to_string(),
            message: err.to_string(),
        };
        self.scheduler_config()
            .validate()
            .map_err(|e| invalid("scheduler.max_block_minutes", e))?;
        if self.scheduler.horizon_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.horizon_days".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        self.timezone().map_err(|e| invalid("utc_offset", e))?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_block_minutes: self.scheduler.max_block_minutes,
            break_minutes: self.scheduler.break_minutes,
        }
    }

    pub fn timezone(&self) -> Result<FixedOffset, ValidationError> {
        offset_from_minutes(parse_utc_offset(&self.utc_offset)?)
    }

    pub fn commit_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.commit_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scheduler.max_block_minutes, 90);
        assert_eq!(parsed.scheduler.break_minutes, 15);
        assert_eq!(parsed.scheduler.horizon_days, 7);
        assert_eq!(parsed.user_id, "local");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: Config = toml::from_str("[scheduler]\nbreak_minutes = 10\n").unwrap();
        assert_eq!(parsed.scheduler.break_minutes, 10);
        assert_eq!(parsed.scheduler.max_block_minutes, 90);
        assert_eq!(parsed.commit_timeout_ms, 5000);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("scheduler.max_block_minutes").as_deref(), Some("90"));
        assert_eq!(cfg.get("utc_offset").as_deref(), Some("+00:00"));
        assert!(cfg.get("scheduler.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("scheduler.break_minutes", "10").unwrap();
        assert_eq!(cfg.scheduler_config().break_minutes, 10);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("scheduler.nonexistent", "1").is_err());
        assert!(cfg.set("scheduler.break_minutes", "soon").is_err());
        assert!(cfg.set("scheduler.max_block_minutes", "0").is_err());
        assert!(cfg.set("utc_offset", "tokyo").is_err());
        assert!(cfg.set("scheduler", "1").is_err());
        assert_eq!(cfg.scheduler.max_block_minutes, 90);
    }

    #[test]
    fn timezone_parses_offset() {
        let mut cfg = Config::default();
        cfg.set("utc_offset", "+09:00").unwrap();
        assert_eq!(cfg.timezone().unwrap().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.set("user_id", "creator-42").unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.user_id, "creator-42");
    }
}
