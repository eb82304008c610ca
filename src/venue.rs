//! Venue-level KPIs: TPM quality, filtering, compliance, oil-change timing,
//! temperature control and the oil-management grade.

use crate::classify::{TpmLevel, oil_age_days};
use crate::compliance::{self, ComplianceSummary, percent, recorded_index};
use crate::error::ConfigurationError;
use crate::oil_change::{ChangeTiming, ChangeTimingCounts, OilChangeEvent, count_timings, detect_oil_changes};
use crate::policy::{AnalyticsSettings, ThresholdPolicy};
use crate::reading::{self, FryerNumber, Reading, VenueId};
use crate::temperature::{TemperatureStats, aggregate_temperature};
use crate::trend::{TrendPoint, daily_tpm_trend, mean};
use crate::window::DateWindow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::iter::Sum;
use std::ops::AddAssign;
use time::Date;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    pub fryer_count: u32,
    #[serde(default)]
    pub warning_threshold: Option<f64>,
    #[serde(default)]
    pub critical_threshold: Option<f64>,
}

impl Venue {
    pub fn new(
        id: impl Into<VenueId>,
        name: impl Into<String>,
        fryer_count: u32,
    ) -> Result<Self, ConfigurationError> {
        let venue = Self {
            id: id.into(),
            name: name.into(),
            fryer_count,
            warning_threshold: None,
            critical_threshold: None,
        };
        venue.validate()?;
        Ok(venue)
    }

    pub fn with_thresholds(mut self, warning: Option<f64>, critical: Option<f64>) -> Self {
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.fryer_count == 0 {
            return Err(ConfigurationError::NoFryers {
                venue_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// The venue's effective thresholds: its overrides on top of `base`.
    pub fn threshold_policy(&self, base: &ThresholdPolicy) -> Result<ThresholdPolicy, ConfigurationError> {
        base.with_overrides(self.warning_threshold, self.critical_threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OilManagementGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl OilManagementGrade {
    pub fn from_score(score: u8) -> Self {
        match score {
            9.. => Self::Excellent,
            6..=8 => Self::Good,
            4..=5 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

impl fmt::Display for OilManagementGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueHealth {
    Good,
    Warning,
    Critical,
}

/// Inputs to the 0–10 oil-management score. Missing rates score nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub filtering_rate: Option<f64>,
    pub avg_tpm: Option<f64>,
    pub critical_rate: Option<f64>,
    pub compliance_rate: f64,
}

pub fn oil_management_score(inputs: &ScoreInputs, policy: &ThresholdPolicy) -> u8 {
    let filtering = match inputs.filtering_rate {
        Some(rate) if rate >= 80.0 => 3,
        Some(rate) if rate >= 60.0 => 2,
        Some(rate) if rate >= 40.0 => 1,
        _ => 0,
    };
    let tpm = match inputs.avg_tpm {
        Some(avg) if avg < 15.0 => 3,
        Some(avg) if avg < policy.warning() => 2,
        Some(avg) if avg < 22.0 => 1,
        _ => 0,
    };
    let critical = match inputs.critical_rate {
        Some(rate) if rate <= 5.0 => 2,
        Some(rate) if rate <= 15.0 => 1,
        _ => 0,
    };
    let compliance = if inputs.compliance_rate >= 90.0 {
        2
    } else if inputs.compliance_rate >= 70.0 {
        1
    } else {
        0
    };
    filtering + tpm + critical + compliance
}

pub fn classify_health(
    compliance_rate: f64,
    critical_rate: Option<f64>,
    avg_tpm: Option<f64>,
) -> VenueHealth {
    let critical_rate = critical_rate.unwrap_or(0.0);
    let avg_tpm = avg_tpm.unwrap_or(0.0);
    if compliance_rate < 70.0 || critical_rate > 25.0 || avg_tpm >= 22.0 {
        VenueHealth::Critical
    } else if compliance_rate < 85.0 || critical_rate > 10.0 || avg_tpm >= 18.0 {
        VenueHealth::Warning
    } else {
        VenueHealth::Good
    }
}

/// Readings per TPM level. Readings without a TPM are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityCounts {
    pub good: u32,
    pub warning: u32,
    pub critical: u32,
}

impl QualityCounts {
    pub fn record(&mut self, level: TpmLevel) {
        match level {
            TpmLevel::Good => self.good += 1,
            TpmLevel::Warning => self.warning += 1,
            TpmLevel::Critical => self.critical += 1,
            TpmLevel::None => {}
        }
    }

    pub fn total(&self) -> u32 {
        self.good + self.warning + self.critical
    }

    /// Share of classified readings at `level`, or `None` without any.
    pub fn rate(&self, level: TpmLevel) -> Option<f64> {
        let count = match level {
            TpmLevel::Good => self.good,
            TpmLevel::Warning => self.warning,
            TpmLevel::Critical => self.critical,
            TpmLevel::None => return None,
        };
        let total = self.total();
        (total > 0).then(|| percent(count as usize, total as usize))
    }
}

impl AddAssign for QualityCounts {
    fn add_assign(&mut self, other: Self) {
        self.good += other.good;
        self.warning += other.warning;
        self.critical += other.critical;
    }
}

impl Sum for QualityCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, counts| {
            acc += counts;
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FryerSummary {
    pub fryer_number: FryerNumber,
    pub reading_count: u32,
    pub last_reading_date: Option<Date>,
    /// False when the fryer's most recent reading was a "not in use" marker.
    pub in_use: bool,
    pub latest_tpm: Option<f64>,
    pub latest_level: TpmLevel,
    pub current_oil_age: Option<u32>,
    pub compliance: ComplianceSummary,
    pub oil_changes: ChangeTimingCounts,
    pub litres_filled: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueRollup {
    pub venue_id: VenueId,
    pub venue_name: String,
    pub fryer_count: u32,
    pub as_of: Date,
    pub window: DateWindow,
    pub thresholds: ThresholdPolicy,
    pub reading_count: u32,
    pub avg_tpm: Option<f64>,
    pub max_tpm: Option<f64>,
    pub quality: QualityCounts,
    pub good_rate: Option<f64>,
    pub warning_rate: Option<f64>,
    pub critical_rate: Option<f64>,
    pub filtering_rate: Option<f64>,
    pub compliance: ComplianceSummary,
    pub oil_changes: ChangeTimingCounts,
    /// Late changes within the late-change alert window ending today.
    pub recent_late_changes: u32,
    pub temperature: TemperatureStats,
    pub litres_filled: f64,
    pub oil_management_score: u8,
    pub oil_management_grade: OilManagementGrade,
    pub health: VenueHealth,
    pub last_reading_date: Option<Date>,
    /// Window dates (up to today) with a recording.
    pub recorded_dates: BTreeSet<Date>,
    pub fryers: Vec<FryerSummary>,
    pub tpm_trend: Vec<TrendPoint>,
}

/// Roll up a venue over the trailing `settings.window_days` ending today.
pub fn rollup_venue(
    venue: &Venue,
    readings: &[Reading],
    policy: &ThresholdPolicy,
    settings: &AnalyticsSettings,
    today: Date,
) -> VenueRollup {
    let window = DateWindow::trailing(today, settings.window_days);
    rollup_venue_in(venue, readings, policy, settings, &window, today)
}

/// Roll up a venue over an explicit window.
///
/// Readings of other venues and readings dated after `today` are ignored.
/// Streaks, oil-change classification and the last-reading date look at the
/// whole history up to today; every other figure covers `window` only.
pub fn rollup_venue_in(
    venue: &Venue,
    readings: &[Reading],
    policy: &ThresholdPolicy,
    settings: &AnalyticsSettings,
    window: &DateWindow,
    today: Date,
) -> VenueRollup {
    let history: Vec<&Reading> = readings
        .iter()
        .filter(|reading| reading.venue_id == venue.id && reading.reading_date <= today)
        .collect();
    let in_window: Vec<&Reading> = history
        .iter()
        .copied()
        .filter(|reading| window.contains(reading.reading_date))
        .collect();

    let tpm_values: Vec<f64> = in_window.iter().filter_map(|reading| reading.tpm()).collect();
    let mut quality = QualityCounts::default();
    for tpm in &tpm_values {
        quality.record(policy.classify(Some(*tpm)));
    }
    let avg_tpm = mean(&tpm_values);
    let max_tpm = tpm_values.iter().copied().reduce(f64::max);

    let filtered: Vec<bool> = in_window
        .iter()
        .filter_map(|reading| reading.filtered_state())
        .collect();
    let filtering_rate = (!filtered.is_empty())
        .then(|| percent(filtered.iter().filter(|f| **f).count(), filtered.len()));

    let recorded = recorded_index(history.iter().copied(), settings.not_in_use_counts_as_recorded);
    let compliance = compliance::summarize(&recorded, window, today);
    let recorded_dates: BTreeSet<Date> = window
        .dates(today)
        .into_iter()
        .filter(|date| recorded.contains_key(date))
        .collect();
    let last_reading_date = recorded.keys().next_back().copied();

    let events = detect_oil_changes(history.iter().copied(), policy);
    let oil_changes = count_timings(&events, Some(window));
    let late_window = DateWindow::trailing(today, settings.late_change_window_days);
    let recent_late_changes = events
        .iter()
        .filter(|event| late_window.contains(event.date) && event.timing == Some(ChangeTiming::Late))
        .count() as u32;

    let temperature = aggregate_temperature(in_window.iter().copied(), &settings.temperature);
    let litres_filled: f64 = in_window.iter().map(|reading| reading.litres()).sum();

    let critical_rate = quality.rate(TpmLevel::Critical);
    let inputs = ScoreInputs {
        filtering_rate,
        avg_tpm,
        critical_rate,
        compliance_rate: f64::from(compliance.rate),
    };
    let oil_management_score = oil_management_score(&inputs, policy);
    let oil_management_grade = OilManagementGrade::from_score(oil_management_score);
    let health = classify_health(f64::from(compliance.rate), critical_rate, avg_tpm);

    let fryers = summarize_fryers(venue, &history, &events, policy, settings, window, today);
    let tpm_trend = daily_tpm_trend(
        in_window.iter().copied(),
        window,
        today,
        settings.trend_period_days,
    );

    debug!(
        venue_id = %venue.id,
        readings = in_window.len(),
        compliance = compliance.rate,
        score = oil_management_score,
        grade = %oil_management_grade,
        health = ?health,
        "Venue rollup computed"
    );

    VenueRollup {
        venue_id: venue.id.clone(),
        venue_name: venue.name.clone(),
        fryer_count: venue.fryer_count,
        as_of: today,
        window: *window,
        thresholds: *policy,
        reading_count: in_window.len() as u32,
        avg_tpm,
        max_tpm,
        quality,
        good_rate: quality.rate(TpmLevel::Good),
        warning_rate: quality.rate(TpmLevel::Warning),
        critical_rate,
        filtering_rate,
        compliance,
        oil_changes,
        recent_late_changes,
        temperature,
        litres_filled,
        oil_management_score,
        oil_management_grade,
        health,
        last_reading_date,
        recorded_dates,
        fryers,
        tpm_trend,
    }
}

fn summarize_fryers(
    venue: &Venue,
    history: &[&Reading],
    events: &[OilChangeEvent],
    policy: &ThresholdPolicy,
    settings: &AnalyticsSettings,
    window: &DateWindow,
    today: Date,
) -> Vec<FryerSummary> {
    let mut fryer_numbers: BTreeSet<FryerNumber> = (1..=venue.fryer_count).collect();
    fryer_numbers.extend(history.iter().map(|reading| reading.fryer_number));

    fryer_numbers
        .into_iter()
        .map(|fryer_number| {
            let fryer_history: Vec<&Reading> = history
                .iter()
                .copied()
                .filter(|reading| reading.fryer_number == fryer_number)
                .collect();
            let fryer_events: Vec<&OilChangeEvent> = events
                .iter()
                .filter(|event| event.fryer_number == fryer_number)
                .collect();

            let latest = reading::latest(fryer_history.iter().copied());
            let latest_tpm = reading::latest(
                fryer_history
                    .iter()
                    .copied()
                    .filter(|reading| reading.tpm().is_some()),
            )
            .and_then(Reading::tpm);

            let recorded = recorded_index(
                fryer_history.iter().copied(),
                settings.not_in_use_counts_as_recorded,
            );
            let in_window = fryer_history
                .iter()
                .filter(|reading| window.contains(reading.reading_date));

            FryerSummary {
                fryer_number,
                reading_count: in_window.clone().count() as u32,
                last_reading_date: latest.map(|reading| reading.reading_date),
                in_use: latest.is_some_and(|reading| !reading.not_in_use),
                latest_tpm,
                latest_level: policy.classify(latest_tpm),
                current_oil_age: current_oil_age(&fryer_history, &fryer_events, today),
                compliance: compliance::summarize(&recorded, window, today),
                oil_changes: count_timings(fryer_events.iter().copied(), Some(window)),
                litres_filled: in_window.map(|reading| reading.litres()).sum(),
            }
        })
        .collect()
}

/// Oil age today: from the last change if one was recorded, otherwise
/// extrapolated from the most recent recorded age.
fn current_oil_age(history: &[&Reading], events: &[&OilChangeEvent], today: Date) -> Option<u32> {
    if let Some(last_change) = events.iter().map(|event| event.date).max() {
        return oil_age_days(last_change, today);
    }
    let aged = reading::latest(
        history
            .iter()
            .copied()
            .filter(|reading| reading.oil_age.is_some()),
    )?;
    let recorded_age = aged.oil_age?;
    let since = oil_age_days(aged.reading_date, today)?;
    Some(recorded_age.saturating_add(since - 1))
}
