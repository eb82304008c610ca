//! Per-reading classification: TPM level, temperature variance and oil age.

use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpmLevel {
    Good,
    Warning,
    Critical,
    None,
}

/// Classify a TPM value against half-open bands `[warning, critical)` and `[critical, ∞)`.
pub fn tpm_status(tpm: Option<f64>, warning: f64, critical: f64) -> TpmLevel {
    match tpm {
        None => TpmLevel::None,
        Some(value) if value.is_nan() => TpmLevel::None,
        Some(value) if value >= critical => TpmLevel::Critical,
        Some(value) if value >= warning => TpmLevel::Warning,
        Some(_) => TpmLevel::Good,
    }
}

/// Fresh oil is recorded as an oil age of exactly one day.
pub fn is_fresh_oil(reading: &Reading) -> bool {
    !reading.not_in_use && reading.oil_age == Some(1)
}

/// `(actual - set) / set * 100`, or `None` when either side is missing or set is zero.
pub fn temp_variance_pct(set: Option<f64>, actual: Option<f64>) -> Option<f64> {
    let (set, actual) = (set?, actual?);
    if set == 0.0 || !set.is_finite() || !actual.is_finite() {
        return None;
    }
    Some((actual - set) / set * 100.0)
}

pub fn is_within_temp_band(variance_pct: f64, band_pct: f64) -> bool {
    variance_pct.abs() <= band_pct
}

/// Age of the oil on `on` when it was changed on `last_change`; the change day is day 1.
pub fn oil_age_days(last_change: Date, on: Date) -> Option<u32> {
    let elapsed = (on - last_change).whole_days();
    if elapsed < 0 {
        return None;
    }
    u32::try_from(elapsed + 1).ok()
}

/// Render a signed percentage as "+2.8%", "-1.2%" or "0%".
pub fn format_signed_pct(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        "0%".to_string()
    } else if rounded > 0.0 {
        format!("+{rounded:.1}%")
    } else {
        format!("{rounded:.1}%")
    }
}
