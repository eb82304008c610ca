//! Oil-change detection and timing classification.
//!
//! An oil change is a date on which a fryer has a fresh-oil reading. The change
//! is judged by the highest TPM on the fryer's previous populated date: below
//! the warning threshold the oil was changed too early, in the warning band it
//! was on time, at or above critical it was late.

use crate::policy::ThresholdPolicy;
use crate::reading::{FryerNumber, Reading, Sequence, VenueId};
use crate::window::{DateWindow, index_by_fryer_and_date};
use serde::Serialize;
use std::iter::Sum;
use std::ops::AddAssign;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTiming {
    Early,
    OnTime,
    Late,
}

pub fn classify_change(previous_max_tpm: f64, policy: &ThresholdPolicy) -> ChangeTiming {
    if previous_max_tpm >= policy.critical() {
        ChangeTiming::Late
    } else if previous_max_tpm >= policy.warning() {
        ChangeTiming::OnTime
    } else {
        ChangeTiming::Early
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OilChangeEvent {
    pub venue_id: VenueId,
    pub fryer_number: FryerNumber,
    pub date: Date,
    /// Sequence of the authoritative fresh-oil reading for the day.
    pub sequence: Sequence,
    pub previous_date: Option<Date>,
    pub previous_max_tpm: Option<f64>,
    /// `None` when there is no earlier populated date with a TPM to judge by.
    pub timing: Option<ChangeTiming>,
}

/// Detect and classify oil changes for every fryer in `readings`.
///
/// Each (venue, fryer) pair has its own timeline, so mixed-venue input is
/// safe. Events are returned ordered by venue, fryer, then date.
pub fn detect_oil_changes<'a, I>(readings: I, policy: &ThresholdPolicy) -> Vec<OilChangeEvent>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let index = index_by_fryer_and_date(
        readings
            .into_iter()
            .filter(|reading| !reading.not_in_use),
    );

    let mut events = Vec::new();
    for ((venue_id, fryer_number), by_date) in &index {
        let mut previous: Option<(Date, Option<f64>)> = None;
        for (date, day_readings) in by_date {
            let marker = day_readings
                .iter()
                .filter(|reading| reading.is_fresh_oil())
                .map(|reading| reading.sequence)
                .min();

            if let Some(sequence) = marker {
                let previous_max_tpm = previous.and_then(|(_, max)| max);
                events.push(OilChangeEvent {
                    venue_id: venue_id.to_string(),
                    fryer_number: *fryer_number,
                    date: *date,
                    sequence,
                    previous_date: previous.map(|(prev_date, _)| prev_date),
                    previous_max_tpm,
                    timing: previous_max_tpm.map(|max| classify_change(max, policy)),
                });
            }

            let day_max = day_readings
                .iter()
                .filter_map(|reading| reading.tpm())
                .reduce(f64::max);
            previous = Some((*date, day_max));
        }
    }
    events
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeTimingCounts {
    pub early: u32,
    pub on_time: u32,
    pub late: u32,
    /// Classified events; always `early + on_time + late`.
    pub total: u32,
    /// Changes with no earlier populated date to judge by.
    pub unclassified: u32,
}

impl ChangeTimingCounts {
    pub fn record(&mut self, timing: Option<ChangeTiming>) {
        match timing {
            Some(ChangeTiming::Early) => self.early += 1,
            Some(ChangeTiming::OnTime) => self.on_time += 1,
            Some(ChangeTiming::Late) => self.late += 1,
            None => {
                self.unclassified += 1;
                return;
            }
        }
        self.total += 1;
    }
}

impl AddAssign for ChangeTimingCounts {
    fn add_assign(&mut self, other: Self) {
        self.early += other.early;
        self.on_time += other.on_time;
        self.late += other.late;
        self.total += other.total;
        self.unclassified += other.unclassified;
    }
}

impl Sum for ChangeTimingCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, counts| {
            acc += counts;
            acc
        })
    }
}

/// Count events, optionally only those whose change date falls inside `window`.
pub fn count_timings<'a, I>(events: I, window: Option<&DateWindow>) -> ChangeTimingCounts
where
    I: IntoIterator<Item = &'a OilChangeEvent>,
{
    let mut counts = ChangeTimingCounts::default();
    for event in events {
        if window.is_none_or(|window| window.contains(event.date)) {
            counts.record(event.timing);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn scenario(day_three_tpm: f64) -> Vec<Reading> {
        vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).fresh_oil().with_tpm(5.0),
            Reading::new("v1", 1, date!(2025 - 03 - 02), 2).with_oil_age(2).with_tpm(12.0),
            Reading::new("v1", 1, date!(2025 - 03 - 03), 3)
                .with_oil_age(3)
                .with_tpm(day_three_tpm),
            Reading::new("v1", 1, date!(2025 - 03 - 04), 4).fresh_oil().with_tpm(4.0),
        ]
    }

    fn timings(readings: &[Reading]) -> Vec<Option<ChangeTiming>> {
        detect_oil_changes(readings, &ThresholdPolicy::default())
            .into_iter()
            .map(|event| event.timing)
            .collect()
    }

    #[test]
    fn change_after_warning_band_is_on_time() {
        assert_eq!(timings(&scenario(19.0)), vec![None, Some(ChangeTiming::OnTime)]);
    }

    #[test]
    fn change_after_critical_is_late() {
        assert_eq!(timings(&scenario(26.0)), vec![None, Some(ChangeTiming::Late)]);
    }

    #[test]
    fn change_below_warning_is_early() {
        assert_eq!(timings(&scenario(10.0)), vec![None, Some(ChangeTiming::Early)]);
    }

    #[test]
    fn previous_populated_date_skips_calendar_gaps_and_not_in_use() {
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(25.0),
            Reading::new("v1", 1, date!(2025 - 03 - 02), 2).with_tpm(15.0),
            Reading::new("v1", 1, date!(2025 - 03 - 04), 3).not_in_use(),
            Reading::new("v1", 1, date!(2025 - 03 - 06), 4).fresh_oil(),
        ];

        let events = detect_oil_changes(&readings, &ThresholdPolicy::default());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous_date, Some(date!(2025 - 03 - 02)));
        assert_eq!(events[0].previous_max_tpm, Some(15.0));
        assert_eq!(events[0].timing, Some(ChangeTiming::Early));
    }

    #[test]
    fn previous_max_uses_highest_reading_of_the_day() {
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(12.0),
            Reading::new("v1", 1, date!(2025 - 03 - 01), 2).with_tpm(24.0),
            Reading::new("v1", 1, date!(2025 - 03 - 01), 3).with_tpm(16.0),
            Reading::new("v1", 1, date!(2025 - 03 - 02), 4).fresh_oil(),
        ];

        assert_eq!(timings(&readings), vec![Some(ChangeTiming::Late)]);
    }

    #[test]
    fn several_fresh_markers_in_a_day_make_one_event() {
        let day = date!(2025 - 03 - 02);
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(20.0),
            Reading::new("v1", 1, day, 9).fresh_oil(),
            Reading::new("v1", 1, day, 7).fresh_oil(),
        ];

        let events = detect_oil_changes(&readings, &ThresholdPolicy::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence, 7);
    }

    #[test]
    fn fryers_are_classified_independently() {
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(30.0),
            Reading::new("v1", 2, date!(2025 - 03 - 01), 2).with_tpm(10.0),
            Reading::new("v1", 2, date!(2025 - 03 - 02), 3).fresh_oil(),
            Reading::new("v1", 1, date!(2025 - 03 - 03), 4).fresh_oil(),
        ];

        let events = detect_oil_changes(&readings, &ThresholdPolicy::default());
        let per_fryer: Vec<(FryerNumber, Option<ChangeTiming>)> =
            events.iter().map(|e| (e.fryer_number, e.timing)).collect();
        assert_eq!(
            per_fryer,
            vec![(1, Some(ChangeTiming::Late)), (2, Some(ChangeTiming::Early))]
        );
    }

    #[test]
    fn fryers_with_the_same_number_in_different_venues_are_separate() {
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(30.0),
            Reading::new("v2", 1, date!(2025 - 03 - 02), 2).with_tpm(10.0),
            Reading::new("v1", 1, date!(2025 - 03 - 03), 3).fresh_oil(),
            Reading::new("v2", 1, date!(2025 - 03 - 03), 4).fresh_oil(),
        ];

        let events = detect_oil_changes(&readings, &ThresholdPolicy::default());
        let per_venue: Vec<(&str, Option<Date>, Option<ChangeTiming>)> = events
            .iter()
            .map(|e| (e.venue_id.as_str(), e.previous_date, e.timing))
            .collect();
        assert_eq!(
            per_venue,
            vec![
                ("v1", Some(date!(2025 - 03 - 01)), Some(ChangeTiming::Late)),
                ("v2", Some(date!(2025 - 03 - 02)), Some(ChangeTiming::Early)),
            ]
        );
    }

    #[test]
    fn counts_partition_classified_events() {
        let mut readings = scenario(26.0);
        readings.push(Reading::new("v1", 1, date!(2025 - 03 - 05), 5).with_tpm(20.0));
        readings.push(Reading::new("v1", 1, date!(2025 - 03 - 06), 6).fresh_oil());

        let events = detect_oil_changes(&readings, &ThresholdPolicy::default());
        let counts = count_timings(&events, None);

        assert_eq!(counts.late, 1);
        assert_eq!(counts.on_time, 1);
        assert_eq!(counts.early, 0);
        assert_eq!(counts.total, counts.early + counts.on_time + counts.late);
        assert_eq!(counts.unclassified, 1);

        let recent = DateWindow::trailing(date!(2025 - 03 - 06), 2);
        let windowed = count_timings(&events, Some(&recent));
        assert_eq!(windowed.on_time, 1);
        assert_eq!(windowed.total, 1);
    }

    #[test]
    fn counts_sum_across_fryers() {
        let a = ChangeTimingCounts {
            early: 1,
            on_time: 2,
            late: 0,
            total: 3,
            unclassified: 1,
        };
        let b = ChangeTimingCounts {
            early: 0,
            on_time: 1,
            late: 4,
            total: 5,
            unclassified: 0,
        };
        let total: ChangeTimingCounts = [a, b].into_iter().sum();
        assert_eq!(total.total, 8);
        assert_eq!(total.late, 4);
        assert_eq!(total.unclassified, 1);
    }
}
