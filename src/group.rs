//! Multi-venue rollups: health distribution, rankings, weekday and weekly
//! recording patterns, alerts and recording health.

use crate::classify::TpmLevel;
use crate::compliance::percent;
use crate::policy::AnalyticsSettings;
use crate::reading::VenueId;
use crate::trend::mean;
use crate::venue::{
    OilManagementGrade, QualityCounts, ScoreInputs, VenueHealth, VenueRollup,
    oil_management_score,
};
use crate::window::{DateWindow, week_start};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::{Date, Weekday};
use tracing::{debug, warn};

const ALERT_COMPLIANCE_BELOW: f64 = 70.0;
const ALERT_CRITICAL_RATE_ABOVE: f64 = 25.0;
const ALERT_FILTERING_BELOW: f64 = 40.0;
const ALERT_LATE_CHANGES_ABOVE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub venue_ids: Vec<VenueId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthDistribution {
    pub good: u32,
    pub warning: u32,
    pub critical: u32,
}

impl HealthDistribution {
    fn record(&mut self, health: VenueHealth) {
        match health {
            VenueHealth::Good => self.good += 1,
            VenueHealth::Warning => self.warning += 1,
            VenueHealth::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueRanking {
    pub venue_id: VenueId,
    pub venue_name: String,
    pub composite_score: f64,
    pub compliance_rate: u32,
    pub filtering_rate: Option<f64>,
    pub critical_rate: Option<f64>,
}

/// Weighted composite of compliance, filtering and the share of non-critical
/// readings. A missing rate contributes nothing, so a venue without TPM
/// readings never earns the non-critical share.
pub fn composite_score(rollup: &VenueRollup) -> f64 {
    let compliance = f64::from(rollup.compliance.rate);
    let filtering = rollup.filtering_rate.unwrap_or(0.0);
    let non_critical = rollup.critical_rate.map_or(0.0, |critical| 100.0 - critical);
    (compliance * 3.0 + filtering * 2.0 + non_critical * 2.0) / 7.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowCompliance,
    HighCriticalRate,
    LowFiltering,
    LateOilChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub venue_id: VenueId,
    pub venue_name: String,
    pub severity: AlertSeverity,
    pub kind: AlertKind,
    pub value: f64,
    pub message: String,
}

pub fn venue_alerts(rollup: &VenueRollup) -> Vec<Alert> {
    let alert = |severity, kind, value: f64, message: String| Alert {
        venue_id: rollup.venue_id.clone(),
        venue_name: rollup.venue_name.clone(),
        severity,
        kind,
        value,
        message,
    };

    let mut alerts = Vec::new();
    let compliance = f64::from(rollup.compliance.rate);
    if compliance < ALERT_COMPLIANCE_BELOW {
        alerts.push(alert(
            AlertSeverity::Critical,
            AlertKind::LowCompliance,
            compliance,
            format!("recording compliance at {compliance:.0}%"),
        ));
    }
    if let Some(rate) = rollup.critical_rate
        && rate > ALERT_CRITICAL_RATE_ABOVE
    {
        alerts.push(alert(
            AlertSeverity::Critical,
            AlertKind::HighCriticalRate,
            rate,
            format!("{rate:.1}% of readings at critical TPM"),
        ));
    }
    if let Some(rate) = rollup.filtering_rate
        && rate < ALERT_FILTERING_BELOW
    {
        alerts.push(alert(
            AlertSeverity::Warning,
            AlertKind::LowFiltering,
            rate,
            format!("oil filtered on {rate:.0}% of readings"),
        ));
    }
    if rollup.recent_late_changes > ALERT_LATE_CHANGES_ABOVE {
        let late = rollup.recent_late_changes;
        alerts.push(alert(
            AlertSeverity::Warning,
            AlertKind::LateOilChanges,
            f64::from(late),
            format!("{late} late oil changes recently"),
        ));
    }
    alerts
}

fn alert_order(a: &Alert, b: &Alert) -> Ordering {
    a.severity
        .cmp(&b.severity)
        .then_with(|| a.venue_name.cmp(&b.venue_name))
        .then_with(|| a.kind.cmp(&b.kind))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayPattern {
    pub weekday: String,
    pub recorded_venue_days: u32,
    pub possible_venue_days: u32,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyCompliance {
    /// Monday of the week.
    pub week_start: Date,
    pub recorded_venue_days: u32,
    pub possible_venue_days: u32,
    pub rate: Option<f64>,
}

/// Venues bucketed by days since their last recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RecordingHealth {
    pub today: u32,
    pub yesterday: u32,
    /// Last recorded two to six days ago.
    pub recent: u32,
    /// Seven or more days ago, or never.
    pub stale: u32,
    pub recording_compliance_pct: f64,
}

pub fn recording_health(rollups: &[&VenueRollup], today: Date) -> RecordingHealth {
    let mut health = RecordingHealth::default();
    for rollup in rollups {
        let since = rollup
            .last_reading_date
            .map(|last| (today - last).whole_days());
        match since {
            Some(0) => health.today += 1,
            Some(1) => health.yesterday += 1,
            Some(2..=6) => health.recent += 1,
            _ => health.stale += 1,
        }
    }
    health.recording_compliance_pct =
        percent((health.today + health.yesterday) as usize, rollups.len());
    health
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRollup {
    pub group_id: String,
    pub group_name: String,
    pub as_of: Date,
    pub window: DateWindow,
    pub venue_count: u32,
    pub health: HealthDistribution,
    pub avg_compliance: f64,
    pub avg_tpm: Option<f64>,
    pub avg_critical_rate: Option<f64>,
    pub filtering_rate: Option<f64>,
    pub oil_management_score: u8,
    pub oil_management_grade: OilManagementGrade,
    pub quality: QualityCounts,
    pub good_rate: Option<f64>,
    pub warning_rate: Option<f64>,
    pub critical_rate: Option<f64>,
    pub litres_filled: f64,
    pub best_venues: Vec<VenueRanking>,
    pub worst_venues: Vec<VenueRanking>,
    pub weekday_pattern: Vec<WeekdayPattern>,
    pub weekly_compliance: Vec<WeeklyCompliance>,
    pub alerts: Vec<Alert>,
    pub recording_health: RecordingHealth,
}

/// Roll up the group's member venues from already computed venue rollups.
///
/// Member ids with no rollup are logged and skipped. Members are expected to
/// be rolled up over `window`; a venue-day outside a member's own window is
/// neither recorded nor possible for that member.
pub fn rollup_group(
    group: &Group,
    rollups: &[VenueRollup],
    settings: &AnalyticsSettings,
    window: &DateWindow,
    today: Date,
) -> GroupRollup {
    let members: Vec<&VenueRollup> = group
        .venue_ids
        .iter()
        .filter_map(|venue_id| {
            let found = rollups.iter().find(|rollup| &rollup.venue_id == venue_id);
            if found.is_none() {
                warn!(group_id = %group.id, venue_id = %venue_id, "Group member has no venue rollup");
            }
            found
        })
        .collect();
    for rollup in &members {
        if rollup.window != *window {
            warn!(
                group_id = %group.id,
                venue_id = %rollup.venue_id,
                "Venue rollup window differs from the group window; only overlapping dates are compared"
            );
        }
    }

    let mut health = HealthDistribution::default();
    for rollup in &members {
        health.record(rollup.health);
    }

    let compliance: Vec<f64> = members
        .iter()
        .map(|rollup| f64::from(rollup.compliance.rate))
        .collect();
    let avg_compliance = mean(&compliance).unwrap_or(0.0);
    let avg_tpm = mean_of(&members, |rollup| rollup.avg_tpm);
    let avg_critical_rate = mean_of(&members, |rollup| rollup.critical_rate);
    let filtering_rate = mean_of(&members, |rollup| rollup.filtering_rate);

    let inputs = ScoreInputs {
        filtering_rate,
        avg_tpm,
        critical_rate: avg_critical_rate,
        compliance_rate: avg_compliance,
    };
    let score = oil_management_score(&inputs, &settings.thresholds);

    let quality: QualityCounts = members.iter().map(|rollup| rollup.quality).sum();
    let litres_filled: f64 = members.iter().map(|rollup| rollup.litres_filled).sum();

    let (best_venues, worst_venues) = rank_venues(&members, settings.ranking_limit);

    let mut alerts: Vec<Alert> = members
        .iter()
        .flat_map(|rollup| venue_alerts(rollup))
        .collect();
    alerts.sort_by(alert_order);

    let dates = window.dates(today);
    let rollup = GroupRollup {
        group_id: group.id.clone(),
        group_name: group.name.clone(),
        as_of: today,
        window: *window,
        venue_count: members.len() as u32,
        health,
        avg_compliance,
        avg_tpm,
        avg_critical_rate,
        filtering_rate,
        oil_management_score: score,
        oil_management_grade: OilManagementGrade::from_score(score),
        quality,
        good_rate: quality.rate(TpmLevel::Good),
        warning_rate: quality.rate(TpmLevel::Warning),
        critical_rate: quality.rate(TpmLevel::Critical),
        litres_filled,
        best_venues,
        worst_venues,
        weekday_pattern: weekday_pattern(&members, &dates),
        weekly_compliance: weekly_compliance(&members, &dates),
        alerts,
        recording_health: recording_health(&members, today),
    };

    debug!(
        group_id = %group.id,
        venues = rollup.venue_count,
        alerts = rollup.alerts.len(),
        grade = %rollup.oil_management_grade,
        "Group rollup computed"
    );
    rollup
}

fn mean_of(members: &[&VenueRollup], value: impl Fn(&VenueRollup) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = members.iter().filter_map(|rollup| value(*rollup)).collect();
    mean(&values)
}

/// Best and worst venues by composite score, each at most `limit` long.
/// Ties are broken by venue name ascending in both lists.
pub fn rank_venues(
    members: &[&VenueRollup],
    limit: usize,
) -> (Vec<VenueRanking>, Vec<VenueRanking>) {
    let rankings: Vec<VenueRanking> = members
        .iter()
        .map(|rollup| VenueRanking {
            venue_id: rollup.venue_id.clone(),
            venue_name: rollup.venue_name.clone(),
            composite_score: composite_score(rollup),
            compliance_rate: rollup.compliance.rate,
            filtering_rate: rollup.filtering_rate,
            critical_rate: rollup.critical_rate,
        })
        .collect();

    let mut best = rankings.clone();
    best.sort_by(|a, b| {
        b.composite_score
            .total_cmp(&a.composite_score)
            .then_with(|| a.venue_name.cmp(&b.venue_name))
    });
    best.truncate(limit);

    let mut worst = rankings;
    worst.sort_by(|a, b| {
        a.composite_score
            .total_cmp(&b.composite_score)
            .then_with(|| a.venue_name.cmp(&b.venue_name))
    });
    worst.truncate(limit);

    (best, worst)
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
];

/// Recorded venue-days over possible venue-days for each weekday, Monday first.
pub fn weekday_pattern(members: &[&VenueRollup], dates: &[Date]) -> Vec<WeekdayPattern> {
    WEEKDAYS
        .iter()
        .map(|weekday| {
            let days: Vec<Date> = dates
                .iter()
                .copied()
                .filter(|date| date.weekday() == *weekday)
                .collect();
            let (recorded, possible) = venue_days(members, &days);
            WeekdayPattern {
                weekday: weekday.to_string(),
                recorded_venue_days: recorded,
                possible_venue_days: possible,
                rate: (possible > 0).then(|| percent(recorded as usize, possible as usize)),
            }
        })
        .collect()
}

/// Compliance per Monday-start week; partial weeks at the window edges only
/// count their own dates.
pub fn weekly_compliance(members: &[&VenueRollup], dates: &[Date]) -> Vec<WeeklyCompliance> {
    let mut weeks: BTreeMap<Date, Vec<Date>> = BTreeMap::new();
    for date in dates {
        weeks.entry(week_start(*date)).or_default().push(*date);
    }

    weeks
        .into_iter()
        .map(|(week_start, days)| {
            let (recorded, possible) = venue_days(members, &days);
            WeeklyCompliance {
                week_start,
                recorded_venue_days: recorded,
                possible_venue_days: possible,
                rate: (possible > 0).then(|| percent(recorded as usize, possible as usize)),
            }
        })
        .collect()
}

fn venue_days(members: &[&VenueRollup], days: &[Date]) -> (u32, u32) {
    let mut recorded = 0;
    let mut possible = 0;
    for rollup in members {
        let covered = days.iter().filter(|day| rollup.window.contains(**day));
        possible += covered.clone().count();
        recorded += covered
            .filter(|day| rollup.recorded_dates.contains(*day))
            .count();
    }
    (recorded as u32, possible as u32)
}
