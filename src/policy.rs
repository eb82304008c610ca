//! Operating thresholds and analytics settings.
//!
//! Every value here is validated once when it is built, so the rollup code can
//! take it by reference without re-checking it on each call.

use crate::classify::{TpmLevel, tpm_status};
use crate::error::ConfigurationError;
use serde::Serialize;

pub const DEFAULT_WARNING_THRESHOLD: f64 = 18.0;
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 24.0;
pub const DEFAULT_TEMP_BAND_PCT: f64 = 7.0;
pub const DEFAULT_GOOD_TEMP_BAND_PCT: f64 = 3.0;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_LATE_CHANGE_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_TREND_PERIOD_DAYS: u32 = 7;
pub const DEFAULT_RANKING_LIMIT: usize = 5;

/// Warning and critical TPM thresholds (percent), `warning < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdPolicy {
    warning: f64,
    critical: f64,
}

impl ThresholdPolicy {
    pub fn new(warning: f64, critical: f64) -> Result<Self, ConfigurationError> {
        for value in [warning, critical] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidThreshold(value));
            }
        }
        if warning >= critical {
            return Err(ConfigurationError::ThresholdOrder { warning, critical });
        }
        Ok(Self { warning, critical })
    }

    /// Resolve optional configured values, falling back to the defaults.
    pub fn resolve(warning: Option<f64>, critical: Option<f64>) -> Result<Self, ConfigurationError> {
        Self::new(
            warning.unwrap_or(DEFAULT_WARNING_THRESHOLD),
            critical.unwrap_or(DEFAULT_CRITICAL_THRESHOLD),
        )
    }

    /// Apply per-venue overrides on top of this policy.
    pub fn with_overrides(
        &self,
        warning: Option<f64>,
        critical: Option<f64>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            warning.unwrap_or(self.warning),
            critical.unwrap_or(self.critical),
        )
    }

    pub fn warning(&self) -> f64 {
        self.warning
    }

    pub fn critical(&self) -> f64 {
        self.critical
    }

    pub fn classify(&self, tpm: Option<f64>) -> TpmLevel {
        tpm_status(tpm, self.warning, self.critical)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING_THRESHOLD,
            critical: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

/// Allowed deviation of actual from set fryer temperature, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureBand {
    band_pct: f64,
    good_band_pct: f64,
}

impl TemperatureBand {
    pub fn new(band_pct: f64, good_band_pct: f64) -> Result<Self, ConfigurationError> {
        for value in [band_pct, good_band_pct] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidTemperatureBand(value));
            }
        }
        Ok(Self {
            band_pct,
            good_band_pct,
        })
    }

    /// Band used for the temperature-control rate.
    pub fn band_pct(&self) -> f64 {
        self.band_pct
    }

    /// Stricter band used to highlight well-controlled fryers.
    pub fn good_band_pct(&self) -> f64 {
        self.good_band_pct
    }
}

impl Default for TemperatureBand {
    fn default() -> Self {
        Self {
            band_pct: DEFAULT_TEMP_BAND_PCT,
            good_band_pct: DEFAULT_GOOD_TEMP_BAND_PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSettings {
    pub thresholds: ThresholdPolicy,
    pub temperature: TemperatureBand,
    /// Trailing window, in days, that venue rollups cover.
    pub window_days: u32,
    /// Trailing window, in days, for the late-change alert.
    pub late_change_window_days: u32,
    /// Period of the TPM simple moving average.
    pub trend_period_days: u32,
    /// How many venues the best/worst rankings list.
    pub ranking_limit: usize,
    /// Whether a "not in use" marker counts as a recording for compliance and streaks.
    pub not_in_use_counts_as_recorded: bool,
}

impl AnalyticsSettings {
    pub fn validate(self) -> Result<Self, ConfigurationError> {
        let lengths = [
            ("window_days", self.window_days),
            ("late_change_window_days", self.late_change_window_days),
            ("trend_period_days", self.trend_period_days),
        ];
        for (field, value) in lengths {
            if value == 0 {
                return Err(ConfigurationError::ZeroLength { field });
            }
        }
        Ok(self)
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdPolicy::default(),
            temperature: TemperatureBand::default(),
            window_days: DEFAULT_WINDOW_DAYS,
            late_change_window_days: DEFAULT_LATE_CHANGE_WINDOW_DAYS,
            trend_period_days: DEFAULT_TREND_PERIOD_DAYS,
            ranking_limit: DEFAULT_RANKING_LIMIT,
            not_in_use_counts_as_recorded: true,
        }
    }
}
