//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Pomodoro timer durations
//! - Session alert polling and reminder settings
//! - Notification channels and sound
//! - Tutor (Gemini) model, voice and prompt
//!
//! Configuration is stored at `~/.config/studyroom/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::alerts::AlertSettings;
use crate::error::{ConfigError, ValidationError};
use crate::timer::Cycle;

pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MAX_POLL_INTERVAL_SECS: u64 = 60;

/// Pomodoro timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_study_minutes")]
    pub study_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    #[serde(default = "default_cycles_before_long_break")]
    pub cycles_before_long_break: u32,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

/// Session alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Reminder this many minutes before a session starts (0 = off).
    #[serde(default)]
    pub lead_minutes: u16,
    #[serde(default = "default_true")]
    pub notify_on_end: bool,
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: u16,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Try system notifications before falling back to the terminal.
    #[serde(default = "default_true")]
    pub desktop: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
}

/// Gemini tutor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Past messages sent along with each question.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyroom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub tutor: TutorConfig,
}

// Default functions
fn default_study_minutes() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_cycles_before_long_break() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    10
}
fn default_grace_minutes() -> u16 {
    2
}
fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".into()
}
fn default_voice() -> String {
    "Kore".into()
}
fn default_system_prompt() -> String {
    "You are a patient study tutor. Explain concepts step by step, check the \
     student's understanding with short questions, and keep answers focused on \
     what was asked."
        .into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_history_limit() -> u32 {
    20
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            study_minutes: default_study_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            cycles_before_long_break: default_cycles_before_long_break(),
            auto_advance: true,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            lead_minutes: 0,
            notify_on_end: true,
            grace_minutes: default_grace_minutes(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desktop: true,
            sound: true,
        }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            history_limit: default_history_limit(),
            request_timeout_secs: default_request_timeout(),
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
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing and returning the default when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Change a value in memory without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value has the wrong type.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        if key.starts_with("timer.") {
            updated.try_cycle().map_err(|e| invalid(e.to_string()))?;
        }
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// The timer cycle described by the `[timer]` section.
    pub fn try_cycle(&self) -> Result<Cycle, ValidationError> {
        let t = &self.timer;
        Cycle::pomodoro(
            u64::from(t.study_minutes),
            u64::from(t.short_break_minutes),
            u64::from(t.long_break_minutes),
            t.cycles_before_long_break,
        )
    }

    /// Like [`Config::try_cycle`], falling back to the default cycle when a
    /// hand-edited file holds values `config set` would refuse.
    pub fn cycle(&self) -> Cycle {
        self.try_cycle().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid [timer] section, using default cycle");
            Cycle::default()
        })
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            lead_minutes: self.alerts.lead_minutes,
            notify_on_end: self.alerts.notify_on_end,
            grace_minutes: self.alerts.grace_minutes,
        }
    }

    /// Poll interval clamped to 5..=60 seconds.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.alerts
                .poll_interval_secs
                .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS),
        )
    }
}
