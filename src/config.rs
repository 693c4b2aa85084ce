use clap::ValueEnum;
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::penalty::PenaltyMode;
use crate::session::{Goal, SessionConfig, MAX_DURATION_MS, MAX_WORD_GOAL};

/// Which goal a new session is started with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GoalMode {
    #[default]
    Duration,
    Words,
}

/// Persisted user preferences. Unknown or missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub session_minutes: u64,
    pub word_goal: u64,
    pub idle_timeout_secs: u64,
    pub penalty_mode: PenaltyMode,
    pub warning_threshold_secs: u64,
    /// Display only, `#rrggbb`.
    pub warning_color: String,
    pub goal_mode: GoalMode,
    pub practice_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_minutes: 5,
            word_goal: 500,
            idle_timeout_secs: 5,
            penalty_mode: PenaltyMode::All,
            warning_threshold_secs: 3,
            warning_color: "#ff4040".to_string(),
            goal_mode: GoalMode::Duration,
            practice_mode: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_minutes == 0 || self.session_minutes.saturating_mul(60_000) > MAX_DURATION_MS {
            return Err(ConfigError::invalid(
                "session_minutes",
                "must be between 1 and 1440",
            ));
        }
        if self.word_goal == 0 || self.word_goal > MAX_WORD_GOAL {
            return Err(ConfigError::invalid(
                "word_goal",
                format!("must be between 1 and {MAX_WORD_GOAL}"),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "idle_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.warning_threshold_secs > self.idle_timeout_secs {
            return Err(ConfigError::invalid(
                "warning_threshold_secs",
                "must not exceed idle_timeout_secs",
            ));
        }
        if parse_hex_color(&self.warning_color).is_none() {
            return Err(ConfigError::invalid(
                "warning_color",
                format!("'{}' is not a #rrggbb color", self.warning_color),
            ));
        }
        Ok(())
    }

    pub fn goal(&self) -> Goal {
        match self.goal_mode {
            GoalMode::Duration => Goal::Duration {
                duration_ms: self.session_minutes.saturating_mul(60_000),
            },
            GoalMode::Words => Goal::WordCount {
                words: self.word_goal,
            },
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.goal())
            .with_idle_timeout(self.idle_timeout_secs.saturating_mul(1000))
            .with_warning_threshold(self.warning_threshold_secs.saturating_mul(1000))
            .with_penalty(self.penalty_mode)
    }

    /// Warning color as RGB; falls back to the default red when malformed.
    pub fn warning_rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.warning_color).unwrap_or((0xff, 0x40, 0x40))
    }
}

/// Only `#rrggbb` is accepted; named and indexed colors can't be blended.
pub fn parse_hex_color(s: &str) -> Option<(u8, u8, u8)> {
    match Color::from_str(s) {
        Ok(Color::Rgb(r, g, b)) => Some((r, g, b)),
        _ => None,
    }
}

pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "keepwriting") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("keepwriting_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };
        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) if settings.validate().is_ok() => settings,
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "ignoring invalid settings file");
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(settings)?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, data)
        };
        write().map_err(|source| ConfigError::Save {
            path: self.path.clone(),
            source,
        })
    }
}
