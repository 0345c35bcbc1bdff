//! Configuration file support for the rehab tools.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/rehab/config.toml`.

use crate::{Error, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub program: ProgramConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default = "default_reminders")]
    pub reminders: Vec<ReminderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            program: ProgramConfig::default(),
            progression: ProgressionConfig::default(),
            session: SessionConfig::default(),
            reminders: default_reminders(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Program selection on first run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramConfig {
    #[serde(default = "default_program")]
    pub default_program: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            default_program: default_program(),
        }
    }
}

/// Weekly progression parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Load multiplier applied when a week is accepted
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Rest multiplier applied when a week is accepted
    #[serde(default = "default_rest_factor")]
    pub rest_factor: f64,

    /// Fraction removed from load fields by the pain-response action
    #[serde(default = "default_reduction_percent")]
    pub reduction_percent: f64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            rest_factor: default_rest_factor(),
            reduction_percent: default_reduction_percent(),
        }
    }
}

/// Session timing parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_prepare_seconds")]
    pub prepare_seconds: u32,

    #[serde(default = "default_mini_rest_seconds")]
    pub mini_rest_seconds: u32,

    #[serde(default = "default_seconds_per_dynamic_rep")]
    pub seconds_per_dynamic_rep: u32,

    #[serde(default = "default_resume_window_hours")]
    pub resume_window_hours: i64,

    /// Exercise phases at or below this length get no mid-phase hold cue
    #[serde(default = "default_hold_cue_threshold_seconds")]
    pub hold_cue_threshold_seconds: u32,

    #[serde(default = "default_exit_delay_seconds")]
    pub exit_delay_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prepare_seconds: default_prepare_seconds(),
            mini_rest_seconds: default_mini_rest_seconds(),
            seconds_per_dynamic_rep: default_seconds_per_dynamic_rep(),
            resume_window_hours: default_resume_window_hours(),
            hold_cue_threshold_seconds: default_hold_cue_threshold_seconds(),
            exit_delay_seconds: default_exit_delay_seconds(),
        }
    }
}

/// One daily exercise reminder
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Time of day, `HH:MM`
    pub time: String,
}

impl ReminderConfig {
    pub fn time_of_day(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M")
            .map_err(|e| Error::Config(format!("Invalid reminder time '{}': {}", self.time, e)))
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        PathBuf::from(home).join(".local/share")
    });
    base.join("rehab")
}

fn default_program() -> String {
    crate::catalog::DEFAULT_PROGRAM_ID.to_string()
}

fn default_multiplier() -> f64 {
    1.10
}

fn default_rest_factor() -> f64 {
    0.95
}

fn default_reduction_percent() -> f64 {
    0.25
}

fn default_prepare_seconds() -> u32 {
    5
}

fn default_mini_rest_seconds() -> u32 {
    3
}

fn default_seconds_per_dynamic_rep() -> u32 {
    3
}

fn default_resume_window_hours() -> i64 {
    24
}

fn default_hold_cue_threshold_seconds() -> u32 {
    10
}

fn default_exit_delay_seconds() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_reminders() -> Vec<ReminderConfig> {
    vec![
        ReminderConfig {
            enabled: true,
            time: "09:00".into(),
        },
        ReminderConfig {
            enabled: false,
            time: "18:30".into(),
        },
    ]
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the progression and session code cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.progression.multiplier <= 1.0 {
            return Err(Error::Config(format!(
                "progression.multiplier must be > 1.0, got {}",
                self.progression.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.progression.reduction_percent) {
            return Err(Error::Config(format!(
                "progression.reduction_percent must be in [0, 1), got {}",
                self.progression.reduction_percent
            )));
        }
        if self.session.prepare_seconds == 0 || self.session.mini_rest_seconds == 0 {
            return Err(Error::Config(
                "session phase lengths must be at least 1 second".into(),
            ));
        }
        for reminder in &self.reminders {
            reminder.time_of_day()?;
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
        base.join("rehab").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.progression.multiplier, 1.10);
        assert_eq!(config.progression.reduction_percent, 0.25);
        assert_eq!(config.session.prepare_seconds, 5);
        assert_eq!(config.session.mini_rest_seconds, 3);
        assert_eq!(config.session.resume_window_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.progression.multiplier, parsed.progression.multiplier);
        assert_eq!(config.reminders, parsed.reminders);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[session]
prepare_seconds = 8
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.prepare_seconds, 8);
        assert_eq!(config.session.mini_rest_seconds, 3); // default
        assert_eq!(config.reminders.len(), 2); // default
    }

    #[test]
    fn test_invalid_reminder_time_rejected() {
        let mut config = Config::default();
        config.reminders = vec![ReminderConfig {
            enabled: true,
            time: "25:99".into(),
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[progression]\nmultiplier = 1.2\n\n[[reminders]]\ntime = \"07:15\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.progression.multiplier, 1.2);
        assert_eq!(config.reminders.len(), 1);
        assert!(config.reminders[0].enabled);
    }
}
