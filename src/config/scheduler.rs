//! Scheduler configuration for the daily batch run.
//!
//! # Example
//!
//! ```toml
//! [scheduler]
//! enabled = true
//! daily_at = "08:00"
//! interval_days = 1
//! run_on_startup = false
//! ```

use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Whether the scheduled batch run is enabled.
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time of day (UTC) to run, as `HH:MM` or `HH:MM:SS`.
    /// Default: "08:00"
    #[serde(default = "default_daily_at")]
    pub daily_at: String,

    /// Days between runs.
    /// Default: 1
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,

    /// Run once immediately at startup, before the first scheduled run.
    /// Default: false
    #[serde(default)]
    pub run_on_startup: bool,

    /// How often to log the next scheduled run while waiting (in minutes).
    /// Default: 60
    #[serde(default = "default_heartbeat_minutes")]
    pub heartbeat_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_at: default_daily_at(),
            interval_days: default_interval_days(),
            run_on_startup: false,
            heartbeat_minutes: default_heartbeat_minutes(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.time_of_day()?;
        if self.interval_days == 0 {
            return Err(ConfigError::Validation(
                "scheduler.interval_days must be greater than 0".into(),
            ));
        }
        if self.heartbeat_minutes == 0 {
            return Err(ConfigError::Validation(
                "scheduler.heartbeat_minutes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parsed `daily_at`.
    pub fn time_of_day(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.daily_at, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&self.daily_at, "%H:%M"))
            .map_err(|_| {
                ConfigError::Validation(format!(
                    "scheduler.daily_at must be HH:MM or HH:MM:SS, got '{}'",
                    self.daily_at
                ))
            })
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_minutes * 60)
    }
}

fn default_true() -> bool {
    true
}

fn default_daily_at() -> String {
    "08:00".to_string()
}

fn default_interval_days() -> u32 {
    1
}

fn default_heartbeat_minutes() -> u64 {
    60
}
