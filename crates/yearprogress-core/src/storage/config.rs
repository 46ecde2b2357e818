//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Week start day and label precision
//! - Elapsed or remaining headline
//! - Per-widget refresh cadences and the store read timeout
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::progress::{CalculationType, ProgressConfig, MAX_DECIMAL_DIGITS};
use crate::scheduler::WidgetKind;

/// Widgets never refresh more often than this.
pub const MIN_CADENCE_SECS: u64 = 5;

/// Progress display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSettings {
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default)]
    pub week_start_day: u8,
    #[serde(default = "default_decimal_digits")]
    pub decimal_digits: u8,
    #[serde(default = "default_decimal_digits")]
    pub event_decimal_digits: u8,
    #[serde(default)]
    pub calculation_type: CalculationType,
}

/// Widget refresh configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSettings {
    #[serde(default = "default_day_cadence")]
    pub day_cadence_secs: u64,
    #[serde(default = "default_week_cadence")]
    pub week_cadence_secs: u64,
    #[serde(default = "default_month_cadence")]
    pub month_cadence_secs: u64,
    #[serde(default = "default_year_cadence")]
    pub year_cadence_secs: u64,
    #[serde(default = "default_event_cadence")]
    pub event_cadence_secs: u64,
    #[serde(default = "default_store_read_timeout")]
    pub store_read_timeout_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub progress: ProgressSettings,
    #[serde(default)]
    pub widgets: WidgetSettings,
}

// Default functions
fn default_decimal_digits() -> u8 {
    2
}
fn default_day_cadence() -> u64 {
    60
}
fn default_week_cadence() -> u64 {
    300
}
fn default_month_cadence() -> u64 {
    900
}
fn default_year_cadence() -> u64 {
    3_600
}
fn default_event_cadence() -> u64 {
    60
}
fn default_store_read_timeout() -> u64 {
    2_000
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            week_start_day: 0,
            decimal_digits: default_decimal_digits(),
            event_decimal_digits: default_decimal_digits(),
            calculation_type: CalculationType::Elapsed,
        }
    }
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            day_cadence_secs: default_day_cadence(),
            week_cadence_secs: default_week_cadence(),
            month_cadence_secs: default_month_cadence(),
            year_cadence_secs: default_year_cadence(),
            event_cadence_secs: default_event_cadence(),
            store_read_timeout_ms: default_store_read_timeout(),
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
        if parts.peek().map_or(true, |p| p.is_empty()) {
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
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.to_ascii_lowercase()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
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
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
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

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is rejected by
    /// [`Config::validate`]. The config is left untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.progress;
        if p.week_start_day > 6 {
            return Err(ConfigError::InvalidValue {
                key: "progress.week_start_day".into(),
                message: format!("{} is not in 0..=6 (0 = Sunday)", p.week_start_day),
            });
        }
        for (key, digits) in [
            ("progress.decimal_digits", p.decimal_digits),
            ("progress.event_decimal_digits", p.event_decimal_digits),
        ] {
            if digits > MAX_DECIMAL_DIGITS {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("{digits} exceeds the maximum of {MAX_DECIMAL_DIGITS}"),
                });
            }
        }

        let w = &self.widgets;
        for (key, secs) in [
            ("widgets.day_cadence_secs", w.day_cadence_secs),
            ("widgets.week_cadence_secs", w.week_cadence_secs),
            ("widgets.month_cadence_secs", w.month_cadence_secs),
            ("widgets.year_cadence_secs", w.year_cadence_secs),
            ("widgets.event_cadence_secs", w.event_cadence_secs),
        ] {
            if secs < MIN_CADENCE_SECS {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be at least {MIN_CADENCE_SECS} seconds"),
                });
            }
        }
        if w.store_read_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "widgets.store_read_timeout_ms".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Settings used for calendar period widgets.
    pub fn progress_config(&self) -> ProgressConfig {
        ProgressConfig {
            week_start_day: self.progress.week_start_day,
            decimal_digits: self.progress.decimal_digits,
            calculation_type: self.progress.calculation_type,
        }
    }

    /// Settings used for event widgets.
    pub fn event_progress_config(&self) -> ProgressConfig {
        self.progress_config()
            .with_decimal_digits(self.progress.event_decimal_digits)
    }

    /// Refresh cadence for a widget kind.
    pub fn cadence(&self, kind: WidgetKind) -> Duration {
        use crate::period::CalendarPeriod;

        let w = &self.widgets;
        let secs = match kind {
            WidgetKind::Period(CalendarPeriod::Day) => w.day_cadence_secs,
            WidgetKind::Period(CalendarPeriod::Week) => w.week_cadence_secs,
            WidgetKind::Period(CalendarPeriod::Month) => w.month_cadence_secs,
            WidgetKind::Period(CalendarPeriod::Year) => w.year_cadence_secs,
            WidgetKind::Event(_) => w.event_cadence_secs,
        };
        Duration::from_secs(secs.max(MIN_CADENCE_SECS))
    }

    pub fn store_read_timeout(&self) -> Duration {
        Duration::from_millis(self.widgets.store_read_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::CalendarPeriod;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[progress]\nweek_start_day = 1\n").unwrap();
        assert_eq!(parsed.progress.week_start_day, 1);
        assert_eq!(parsed.progress.decimal_digits, 2);
        assert_eq!(parsed.widgets, WidgetSettings::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("progress.week_start_day").as_deref(), Some("0"));
        assert_eq!(cfg.get("progress.calculation_type").as_deref(), Some("elapsed"));
        assert_eq!(cfg.get("widgets.day_cadence_secs").as_deref(), Some("60"));
        assert!(cfg.get("progress.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_number_and_enum() {
        let mut cfg = Config::default();
        cfg.set("progress.week_start_day", "1").unwrap();
        cfg.set("progress.calculation_type", "Remaining").unwrap();
        assert_eq!(cfg.progress.week_start_day, 1);
        assert_eq!(cfg.progress.calculation_type, CalculationType::Remaining);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("progress.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_out_of_range_and_keeps_old_value() {
        let mut cfg = Config::default();
        assert!(cfg.set("progress.week_start_day", "7").is_err());
        assert!(cfg.set("progress.decimal_digits", "12").is_err());
        assert!(cfg.set("widgets.day_cadence_secs", "1").is_err());
        assert!(cfg.set("progress.calculation_type", "both").is_err());
        assert!(cfg.set("progress.week_start_day", "monday").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn entries_lists_every_leaf() {
        let entries = Config::default().entries();
        assert!(entries.contains(&("progress.decimal_digits".into(), "2".into())));
        assert!(entries.contains(&("widgets.store_read_timeout_ms".into(), "2000".into())));
        assert_eq!(entries.len(), 10);
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());

        let mut changed = cfg.clone();
        changed.set("progress.event_decimal_digits", "4").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), changed);
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "progress = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn derived_settings() {
        let mut cfg = Config::default();
        cfg.progress.event_decimal_digits = 0;
        assert_eq!(cfg.progress_config().decimal_digits, 2);
        assert_eq!(cfg.event_progress_config().decimal_digits, 0);
        assert_eq!(
            cfg.cadence(WidgetKind::Period(CalendarPeriod::Year)),
            Duration::from_secs(3_600)
        );
        assert_eq!(cfg.cadence(WidgetKind::Event(3)), Duration::from_secs(60));
        assert_eq!(cfg.store_read_timeout(), Duration::from_millis(2_000));
    }
}
