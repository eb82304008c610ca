//! Recording compliance and consecutive-day streaks.
//!
//! A date is "populated" when the index holds at least one reading for it.
//! Which readings go into the index (in particular "not in use" markers) is
//! decided once by [`recorded_index`], so compliance and both streaks always
//! agree on what counts as a recording.

use crate::reading::Reading;
use crate::window::{DateIndex, DateWindow, index_by_date};
use serde::Serialize;
use time::Date;

pub fn recorded_index<'a, I>(readings: I, not_in_use_counts: bool) -> DateIndex<'a>
where
    I: IntoIterator<Item = &'a Reading>,
{
    index_by_date(
        readings
            .into_iter()
            .filter(|reading| not_in_use_counts || !reading.not_in_use),
    )
}

fn is_populated(index: &DateIndex<'_>, date: Date) -> bool {
    index.get(&date).is_some_and(|readings| !readings.is_empty())
}

/// Percentage of `window_dates` with a recording, rounded to the nearest integer.
pub fn compliance_rate(index: &DateIndex<'_>, window_dates: &[Date]) -> u32 {
    if window_dates.is_empty() {
        return 0;
    }
    let recorded = window_dates
        .iter()
        .filter(|date| is_populated(index, **date))
        .count();
    percent(recorded, window_dates.len()).round() as u32
}

/// Consecutive populated days ending today, or yesterday when today has no
/// recording yet.
pub fn current_streak(index: &DateIndex<'_>, today: Date) -> u32 {
    let mut day = if is_populated(index, today) {
        Some(today)
    } else {
        today.previous_day()
    };

    let mut streak = 0;
    while let Some(current) = day {
        if !is_populated(index, current) {
            break;
        }
        streak += 1;
        day = current.previous_day();
    }
    streak
}

pub fn longest_streak(index: &DateIndex<'_>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<Date> = None;

    for (date, readings) in index {
        if readings.is_empty() {
            continue;
        }
        run = match previous {
            Some(prev) if (*date - prev).whole_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*date);
    }
    longest
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub rate: u32,
    pub recorded_days: u32,
    pub window_days: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

pub fn summarize(index: &DateIndex<'_>, window: &DateWindow, today: Date) -> ComplianceSummary {
    let dates = window.dates(today);
    let recorded_days = dates.iter().filter(|date| is_populated(index, **date)).count();
    ComplianceSummary {
        rate: compliance_rate(index, &dates),
        recorded_days: recorded_days as u32,
        window_days: dates.len() as u32,
        current_streak: current_streak(index, today),
        longest_streak: longest_streak(index),
    }
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn readings_on(days: &[Date]) -> Vec<Reading> {
        days.iter()
            .enumerate()
            .map(|(i, day)| Reading::new("v1", 1, *day, i as u64).with_tpm(12.0))
            .collect()
    }

    #[test]
    fn streak_resets_on_gap() {
        let readings = readings_on(&[
            date!(2025 - 03 - 01),
            date!(2025 - 03 - 02),
            date!(2025 - 03 - 03),
            date!(2025 - 03 - 05),
            date!(2025 - 03 - 06),
        ]);
        let index = recorded_index(&readings, true);

        assert_eq!(longest_streak(&index), 3);
        assert_eq!(current_streak(&index, date!(2025 - 03 - 06)), 2);
    }

    #[test]
    fn day_in_progress_is_not_a_miss() {
        let readings = readings_on(&[date!(2025 - 03 - 04), date!(2025 - 03 - 05)]);
        let index = recorded_index(&readings, true);

        assert_eq!(current_streak(&index, date!(2025 - 03 - 06)), 2);
        assert_eq!(current_streak(&index, date!(2025 - 03 - 07)), 0);
    }

    #[test]
    fn compliance_rounds_to_nearest_integer() {
        let readings = readings_on(&[date!(2025 - 03 - 01), date!(2025 - 03 - 02)]);
        let index = recorded_index(&readings, true);
        let window = DateWindow::trailing(date!(2025 - 03 - 03), 3);

        // 2 of 3 days = 66.67%
        assert_eq!(compliance_rate(&index, &window.dates(date!(2025 - 03 - 03))), 67);
    }

    #[test]
    fn future_dates_do_not_dilute_compliance() {
        let readings = readings_on(&[date!(2025 - 03 - 01), date!(2025 - 03 - 02)]);
        let index = recorded_index(&readings, true);
        let window = DateWindow::trailing(date!(2025 - 03 - 10), 10);

        let summary = summarize(&index, &window, date!(2025 - 03 - 02));
        assert_eq!(summary.window_days, 2);
        assert_eq!(summary.rate, 100);
    }

    #[test]
    fn empty_window_yields_zero() {
        let index = DateIndex::new();
        assert_eq!(compliance_rate(&index, &[]), 0);
        assert_eq!(longest_streak(&index), 0);
    }

    #[test]
    fn not_in_use_counting_is_configurable() {
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(10.0),
            Reading::new("v1", 1, date!(2025 - 03 - 02), 2).not_in_use(),
        ];
        let dates = DateWindow::trailing(date!(2025 - 03 - 02), 2).dates(date!(2025 - 03 - 02));

        let counted = recorded_index(&readings, true);
        assert_eq!(compliance_rate(&counted, &dates), 100);
        assert_eq!(current_streak(&counted, date!(2025 - 03 - 02)), 2);

        let excluded = recorded_index(&readings, false);
        assert_eq!(compliance_rate(&excluded, &dates), 50);
        assert_eq!(current_streak(&excluded, date!(2025 - 03 - 02)), 1);
    }
}
