use crate::error::ConfigurationError;
use crate::group::Group;
use crate::policy::{
    AnalyticsSettings, DEFAULT_GOOD_TEMP_BAND_PCT, DEFAULT_LATE_CHANGE_WINDOW_DAYS,
    DEFAULT_RANKING_LIMIT, DEFAULT_TEMP_BAND_PCT, DEFAULT_TREND_PERIOD_DAYS, DEFAULT_WINDOW_DAYS,
    TemperatureBand, ThresholdPolicy,
};
use crate::venue::Venue;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_READINGS_PATH: &str = "data/readings.json";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub thresholds: Option<ThresholdsSection>,
    #[serde(default)]
    pub temperature: Option<TemperatureSection>,
    #[serde(default)]
    pub analytics: Option<AnalyticsSection>,
    #[serde(default)]
    pub input: Option<InputSection>,
    #[serde(default)]
    pub venues: Vec<Venue>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdsSection {
    /// TPM percentage at which oil is flagged (default: 18)
    pub warning: Option<f64>,
    /// TPM percentage at which oil must be changed (default: 24)
    pub critical: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemperatureSection {
    pub band_pct: Option<f64>,
    pub good_band_pct: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsSection {
    pub window_days: Option<u32>,
    pub late_change_window_days: Option<u32>,
    pub trend_period_days: Option<u32>,
    pub ranking_limit: Option<usize>,
    pub not_in_use_counts_as_recorded: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputSection {
    pub readings_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    pub fn log_level(&self) -> &str {
        let level = self.logging.level.trim();
        if level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            level
        }
    }

    /// Returns the readings file, or the default path if not configured.
    pub fn readings_path(&self) -> &Path {
        self.input
            .as_ref()
            .and_then(|input| input.readings_path.as_deref())
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or(Path::new(DEFAULT_READINGS_PATH))
    }

    pub fn threshold_policy(&self) -> Result<ThresholdPolicy, ConfigurationError> {
        let section = self.thresholds.as_ref();
        ThresholdPolicy::resolve(
            section.and_then(|s| s.warning),
            section.and_then(|s| s.critical),
        )
    }

    pub fn temperature_band(&self) -> Result<TemperatureBand, ConfigurationError> {
        let section = self.temperature.as_ref();
        TemperatureBand::new(
            section
                .and_then(|s| s.band_pct)
                .unwrap_or(DEFAULT_TEMP_BAND_PCT),
            section
                .and_then(|s| s.good_band_pct)
                .unwrap_or(DEFAULT_GOOD_TEMP_BAND_PCT),
        )
    }

    /// Validated engine settings, with defaults for anything not configured.
    pub fn analytics_settings(&self) -> Result<AnalyticsSettings, ConfigurationError> {
        let section = self.analytics.as_ref();
        AnalyticsSettings {
            thresholds: self.threshold_policy()?,
            temperature: self.temperature_band()?,
            window_days: section
                .and_then(|s| s.window_days)
                .unwrap_or(DEFAULT_WINDOW_DAYS),
            late_change_window_days: section
                .and_then(|s| s.late_change_window_days)
                .unwrap_or(DEFAULT_LATE_CHANGE_WINDOW_DAYS),
            trend_period_days: section
                .and_then(|s| s.trend_period_days)
                .unwrap_or(DEFAULT_TREND_PERIOD_DAYS),
            ranking_limit: section
                .and_then(|s| s.ranking_limit)
                .unwrap_or(DEFAULT_RANKING_LIMIT),
            not_in_use_counts_as_recorded: section
                .and_then(|s| s.not_in_use_counts_as_recorded)
                .unwrap_or(true),
        }
        .validate()
    }

    /// Configured venues, each checked to have at least one fryer.
    pub fn venues(&self) -> Result<&[Venue], ConfigurationError> {
        for venue in &self.venues {
            venue.validate()?;
        }
        Ok(&self.venues)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}
