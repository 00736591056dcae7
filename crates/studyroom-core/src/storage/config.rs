//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Phase durations, ceilings and the boundary policy
//! - Observer and user identity
//! - Calendar offset used for weekly progress
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use chrono::{FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{
    BoundaryPolicy, Ceilings, TimerSettings, DEFAULT_ACTIVE_CEILING_SECS, DEFAULT_REST_CEILING_SECS,
};

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_active_minutes")]
    pub active_minutes: u32,
    #[serde(default = "default_rest_minutes")]
    pub rest_minutes: u32,
    #[serde(default = "default_active_ceiling")]
    pub active_ceiling_secs: u64,
    #[serde(default = "default_rest_ceiling")]
    pub rest_ceiling_secs: u64,
    #[serde(default)]
    pub boundary_policy: BoundaryPolicy,
    /// Redraw period of `watch` commands.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

/// Who this installation is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Observer id used in shared sessions. Generated on first load.
    #[serde(default)]
    pub observer_id: String,
    /// Progress is only recorded when a user id is set.
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Offset from UTC for week/day bucketing. Unset means the machine's
    /// local offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

fn default_active_minutes() -> u32 {
    25
}
fn default_rest_minutes() -> u32 {
    5
}
fn default_active_ceiling() -> u64 {
    DEFAULT_ACTIVE_CEILING_SECS
}
fn default_rest_ceiling() -> u64 {
    DEFAULT_REST_CEILING_SECS
}
fn default_tick_interval() -> u64 {
    1000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            active_minutes: default_active_minutes(),
            rest_minutes: default_rest_minutes(),
            active_ceiling_secs: default_active_ceiling(),
            rest_ceiling_secs: default_rest_ceiling(),
            boundary_policy: BoundaryPolicy::default(),
            tick_interval_ms: default_tick_interval(),
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
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part);

                let new_value = match existing {
                    Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    Some(serde_json::Value::Number(_)) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    Some(serde_json::Value::String(_)) => serde_json::Value::String(value.into()),
                    // Optional fields are absent while unset.
                    None if Self::is_optional_key(key) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    _ => return Err(unknown()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn is_optional_key(key: &str) -> bool {
        key == "calendar.utc_offset_minutes"
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, creating a default file on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`. A missing file yields the defaults, which are written
    /// back together with a freshly generated observer id.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        if cfg.identity.observer_id.is_empty() {
            cfg.identity.observer_id = uuid::Uuid::new_v4().to_string();
            cfg.save_to(path)?;
            tracing::info!(observer = %cfg.identity.observer_id, "Generated observer id");
        }
        Ok(cfg)
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
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

    /// Set a value in memory by dot-separated key. The result must still be a
    /// valid configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timer;
        if t.active_minutes == 0 || t.rest_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer".into(),
                message: "durations must be at least one minute".into(),
            });
        }
        if t.active_ceiling_secs == 0 || t.rest_ceiling_secs == 0 || t.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer".into(),
                message: "ceilings and tick interval must be positive".into(),
            });
        }
        if let Some(minutes) = self.calendar.utc_offset_minutes {
            if minutes.unsigned_abs() >= 24 * 60 {
                return Err(ConfigError::InvalidValue {
                    key: "calendar.utc_offset_minutes".into(),
                    message: format!("offset {minutes} is out of range"),
                });
            }
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.calendar
            .utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    pub fn user_id(&self) -> Option<&str> {
        Some(self.identity.user_id.as_str()).filter(|u| !u.is_empty())
    }

    /// Engine settings derived from this configuration.
    pub fn timer_settings(&self) -> TimerSettings {
        let ceilings = Ceilings {
            active_secs: self.timer.active_ceiling_secs.max(1),
            rest_secs: self.timer.rest_ceiling_secs.max(1),
        };
        let active = ceilings.clamp(
            crate::timer::Phase::Active,
            u64::from(self.timer.active_minutes) * 60,
        );
        let rest = ceilings.clamp(
            crate::timer::Phase::Rest,
            u64::from(self.timer.rest_minutes) * 60,
        );
        TimerSettings {
            active_secs: active,
            rest_secs: rest,
            ceilings,
            boundary_policy: self.timer.boundary_policy,
            utc_offset: self.utc_offset(),
            user_id: self.user_id().map(str::to_string),
        }
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
        assert_eq!(parsed.timer.active_minutes, 25);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.active_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("timer.boundary_policy").as_deref(), Some("reset_full"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_number_and_string() {
        let mut cfg = Config::default();
        cfg.set("timer.rest_minutes", "10").unwrap();
        cfg.set("timer.boundary_policy", "preserve").unwrap();
        cfg.set("identity.user_id", "u1").unwrap();
        assert_eq!(cfg.timer.rest_minutes, 10);
        assert_eq!(cfg.timer.boundary_policy, BoundaryPolicy::Preserve);
        assert_eq!(cfg.user_id(), Some("u1"));
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("timer.active_minutes", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("timer.boundary_policy", "sometimes").is_err());
        assert!(cfg.set("timer.active_minutes", "0").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn optional_offset_can_be_set() {
        let mut cfg = Config::default();
        cfg.set("calendar.utc_offset_minutes", "-300").unwrap();
        assert_eq!(cfg.utc_offset(), FixedOffset::west_opt(5 * 3600).unwrap());
        assert!(cfg.set("calendar.utc_offset_minutes", "5000").is_err());
    }

    #[test]
    fn timer_settings_clamp_to_ceilings() {
        let mut cfg = Config::default();
        cfg.timer.rest_minutes = 90;
        let settings = cfg.timer_settings();
        assert_eq!(settings.active_secs, 1500);
        assert_eq!(settings.rest_secs, DEFAULT_REST_CEILING_SECS);
        assert!(settings.user_id.is_none());
    }

    #[test]
    fn first_load_generates_observer_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let first = Config::load_from(&path).unwrap();
        assert!(!first.identity.observer_id.is_empty());
        let second = Config::load_from(&path).unwrap();
        assert_eq!(first.identity.observer_id, second.identity.observer_id);
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
