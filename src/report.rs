use crate::error::ConfigurationError;
use crate::group::{Group, GroupRollup, rollup_group};
use crate::policy::AnalyticsSettings;
use crate::reading::Reading;
use crate::venue::{Venue, VenueRollup, rollup_venue_in};
use crate::window::DateWindow;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use time::Date;
use tracing::{info, warn};

/// Every venue and group rollup for one snapshot of readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub as_of: Date,
    pub window: DateWindow,
    pub settings: AnalyticsSettings,
    /// Readings whose venue is not configured.
    pub unassigned_readings: u32,
    pub venues: Vec<VenueRollup>,
    pub groups: Vec<GroupRollup>,
}

/// Build a report over the trailing `settings.window_days` ending today.
pub fn build_report(
    venues: &[Venue],
    groups: &[Group],
    readings: &[Reading],
    settings: &AnalyticsSettings,
    today: Date,
) -> Result<Report, ConfigurationError> {
    let window = DateWindow::trailing(today, settings.window_days);
    build_report_in(venues, groups, readings, settings, &window, today)
}

/// Build a report over an explicit window. Venue rollups run in parallel.
pub fn build_report_in(
    venues: &[Venue],
    groups: &[Group],
    readings: &[Reading],
    settings: &AnalyticsSettings,
    window: &DateWindow,
    today: Date,
) -> Result<Report, ConfigurationError> {
    let known: BTreeSet<&str> = venues.iter().map(|venue| venue.id.as_str()).collect();
    let unassigned = readings
        .iter()
        .filter(|reading| !known.contains(reading.venue_id.as_str()))
        .count();
    if unassigned > 0 {
        warn!(count = unassigned, "Readings reference venues that are not configured");
    }

    let venue_rollups = venues
        .par_iter()
        .map(|venue| {
            venue.validate()?;
            let policy = venue.threshold_policy(&settings.thresholds)?;
            Ok(rollup_venue_in(venue, readings, &policy, settings, window, today))
        })
        .collect::<Result<Vec<VenueRollup>, ConfigurationError>>()?;

    let group_rollups: Vec<GroupRollup> = groups
        .iter()
        .map(|group| rollup_group(group, &venue_rollups, settings, window, today))
        .collect();

    info!(
        as_of = %today,
        venues = venue_rollups.len(),
        groups = group_rollups.len(),
        readings = readings.len(),
        unassigned,
        "Report built"
    );

    Ok(Report {
        as_of: today,
        window: *window,
        settings: settings.clone(),
        unassigned_readings: unassigned as u32,
        venues: venue_rollups,
        groups: group_rollups,
    })
}
