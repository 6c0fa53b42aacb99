//! TOML-based application configuration.
//!
//! Stores:
//! - Notification schedule thresholds (missed window, cooldown)
//! - Scheduler worker width and dispatch timeout
//! - The reference UTC offset used for calendar-day math
//! - Email provider settings
//!
//! Configuration is stored at `~/.config/vigil/config.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::streak::StreakEngine;

/// Eligibility thresholds and worker settings for the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// A subject is overdue once its last check-in is older than this.
    #[serde(default = "default_missed_threshold_hours")]
    pub missed_threshold_hours: u32,
    /// Minimum gap between two notifications for the same subject.
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
}

/// Calendar reference for day boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailProvider {
    /// Resend HTTP API
    Resend,
    /// Write messages to the log instead of sending
    Log,
}

/// Email delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_provider")]
    pub provider: EmailProvider,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_from")]
    pub from: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/vigil/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Upper bound for the threshold and cooldown windows.
pub const MAX_WINDOW_HOURS: u32 = 100 * 365 * 24;

fn default_missed_threshold_hours() -> u32 {
    48
}
fn default_cooldown_hours() -> u32 {
    24
}
fn default_max_concurrency() -> usize {
    4
}
fn default_dispatch_timeout_secs() -> u64 {
    15
}
fn default_provider() -> EmailProvider {
    EmailProvider::Resend
}
fn default_api_url() -> String {
    "https://api.resend.com/emails".into()
}
fn default_from() -> String {
    "Vigil <onboarding@resend.dev>".into()
}
fn default_api_key_env() -> String {
    "RESEND_API_KEY".into()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            missed_threshold_hours: default_missed_threshold_hours(),
            cooldown_hours: default_cooldown_hours(),
            max_concurrency: default_max_concurrency(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 0,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            from: default_from(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl ScheduleConfig {
    pub fn missed_threshold(&self) -> Duration {
        Duration::hours(i64::from(self.missed_threshold_hours))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::hours(i64::from(self.cooldown_hours))
    }

    pub fn dispatch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dispatch_timeout_secs)
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
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(unknown());
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
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("~/.config/vigil"),
                message: e.to_string(),
            })
    }

    /// Load from the default location, writing defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// fails validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
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

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default configuration");
                Self::default()
            }
        }
    }

    /// Reject values the notifier cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if !(1..=MAX_WINDOW_HOURS).contains(&self.schedule.missed_threshold_hours) {
            return Err(invalid(
                "schedule.missed_threshold_hours",
                "must be between 1 and 876000 (100 years)",
            ));
        }
        if !(1..=MAX_WINDOW_HOURS).contains(&self.schedule.cooldown_hours) {
            return Err(invalid(
                "schedule.cooldown_hours",
                "must be between 1 and 876000 (100 years)",
            ));
        }
        if self.schedule.max_concurrency == 0 {
            return Err(invalid("schedule.max_concurrency", "must be at least 1"));
        }
        if self.schedule.dispatch_timeout_secs == 0 {
            return Err(invalid("schedule.dispatch_timeout_secs", "must be positive"));
        }
        if !(-12..=14).contains(&self.calendar.utc_offset_hours) {
            return Err(invalid("calendar.utc_offset_hours", "must be within -12..=14"));
        }
        if self.email.api_key_env.trim().is_empty() {
            return Err(invalid("email.api_key_env", "must not be empty"));
        }
        Ok(())
    }

    /// Streak engine bound to the configured offset.
    pub fn streak_engine(&self) -> StreakEngine {
        StreakEngine::from_offset_hours(self.calendar.utc_offset_hours).unwrap_or_default()
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

    /// Set a value by dotted key in memory. Does not persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
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
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.schedule.missed_threshold_hours, 48);
        assert_eq!(cfg.schedule.cooldown_hours, 24);
        assert_eq!(cfg.schedule.max_concurrency, 4);
        assert_eq!(cfg.calendar.utc_offset_hours, 0);
        assert_eq!(cfg.email.provider, EmailProvider::Resend);
        assert_eq!(cfg.email.api_key_env, "RESEND_API_KEY");
        assert_eq!(cfg.schedule.missed_threshold(), Duration::days(2));
        assert_eq!(cfg.schedule.cooldown(), Duration::days(1));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("[calendar]\nutc_offset_hours = 8\n").unwrap();
        assert_eq!(cfg.calendar.utc_offset_hours, 8);
        assert_eq!(cfg.schedule, ScheduleConfig::default());
        assert_eq!(cfg.email, EmailConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("schedule.cooldown_hours").as_deref(), Some("24"));
        assert_eq!(cfg.get("email.provider").as_deref(), Some("resend"));
        assert!(cfg.get("schedule.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("calendar.utc_offset_hours", "-5").unwrap();
        cfg.set("email.provider", "log").unwrap();
        assert_eq!(cfg.calendar.utc_offset_hours, -5);
        assert_eq!(cfg.email.provider, EmailProvider::Log);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("schedule.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("schedule", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_values_and_keeps_state() {
        let mut cfg = Config::default();
        assert!(cfg.set("schedule.max_concurrency", "zero").is_err());
        assert!(cfg.set("schedule.max_concurrency", "0").is_err());
        assert!(cfg.set("calendar.utc_offset_hours", "20").is_err());
        assert!(cfg.set("email.provider", "carrier-pigeon").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_windows_beyond_a_century() {
        let mut cfg = Config::default();
        assert!(cfg.set("schedule.missed_threshold_hours", "4000000000").is_err());
        assert!(cfg.set("schedule.cooldown_hours", "876001").is_err());
        assert_eq!(cfg, Config::default());

        cfg.set("schedule.cooldown_hours", "876000").unwrap();
        assert_eq!(cfg.schedule.cooldown_hours, MAX_WINDOW_HOURS);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\ncooldown_hours = 0\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn streak_engine_uses_offset() {
        let mut cfg = Config::default();
        cfg.calendar.utc_offset_hours = 9;
        assert_eq!(cfg.streak_engine().offset().local_minus_utc(), 9 * 3600);
    }
}
