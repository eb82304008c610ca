//! Date indexing and reporting windows.
//!
//! Every view (day, week, month, quarter, year, trailing N days) resolves to a
//! [`DateWindow`]; the rollups only ever see the window and the indices built
//! here.

use crate::error::ConfigurationError;
use crate::reading::{FryerNumber, Reading};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Date, Duration, Month};

/// Readings grouped by date, ascending. Input order is kept within a date.
pub type DateIndex<'a> = BTreeMap<Date, Vec<&'a Reading>>;
/// Readings grouped by (venue, fryer), then date. Fryer numbers are only
/// unique within a venue.
pub type FryerDateIndex<'a> = BTreeMap<(&'a str, FryerNumber), DateIndex<'a>>;

pub fn index_by_date<'a, I>(readings: I) -> DateIndex<'a>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut index = DateIndex::new();
    for reading in readings {
        index.entry(reading.reading_date).or_default().push(reading);
    }
    index
}

pub fn index_by_fryer_and_date<'a, I>(readings: I) -> FryerDateIndex<'a>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut index = FryerDateIndex::new();
    for reading in readings {
        index
            .entry((reading.venue_id.as_str(), reading.fryer_number))
            .or_default()
            .entry(reading.reading_date)
            .or_default()
            .push(reading);
    }
    index
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateWindow")]
pub struct DateWindow {
    start: Date,
    end: Date,
}

#[derive(Deserialize)]
struct RawDateWindow {
    start: Date,
    end: Date,
}

impl TryFrom<RawDateWindow> for DateWindow {
    type Error = ConfigurationError;

    fn try_from(raw: RawDateWindow) -> Result<Self, Self::Error> {
        DateWindow::new(raw.start, raw.end)
    }
}

impl DateWindow {
    pub fn new(start: Date, end: Date) -> Result<Self, ConfigurationError> {
        if start > end {
            return Err(ConfigurationError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: Date) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// `days` calendar days ending on `end`, inclusive.
    pub fn trailing(end: Date, days: u32) -> Self {
        let back = i64::from(days.max(1)) - 1;
        let start = end.checked_sub(Duration::days(back)).unwrap_or(Date::MIN);
        Self { start, end }
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// Dates of this window that are not in the future relative to `today`.
    pub fn dates(&self, today: Date) -> Vec<Date> {
        dates_in_window(self.start, self.end, today)
    }
}

/// Inclusive date range whose upper bound never exceeds `today`.
pub fn dates_in_window(start: Date, end: Date, today: Date) -> Vec<Date> {
    let last = end.min(today);
    let mut dates = Vec::new();
    let mut current = start;
    while current <= last {
        dates.push(current);
        match current.next_day() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowPreset {
    Day,
    /// Monday to Sunday.
    Week,
    Month,
    Quarter,
    Year,
    Trailing { days: u32 },
}

impl WindowPreset {
    /// Resolve the preset around `anchor`. Trailing windows end on the anchor.
    pub fn window(self, anchor: Date) -> DateWindow {
        match self {
            WindowPreset::Day => DateWindow::single(anchor),
            WindowPreset::Week => {
                let start = week_start(anchor);
                let end = start.checked_add(Duration::days(6)).unwrap_or(Date::MAX);
                DateWindow { start, end }
            }
            WindowPreset::Month => DateWindow {
                start: month_start(anchor.year(), anchor.month()),
                end: month_end(anchor.year(), anchor.month()),
            },
            WindowPreset::Quarter => {
                let first = quarter_first_month(anchor.month());
                DateWindow {
                    start: month_start(anchor.year(), first),
                    end: month_end(anchor.year(), first.next().next()),
                }
            }
            WindowPreset::Year => DateWindow {
                start: month_start(anchor.year(), Month::January),
                end: month_end(anchor.year(), Month::December),
            },
            WindowPreset::Trailing { days } => DateWindow::trailing(anchor, days),
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: Date) -> Date {
    let offset = i64::from(date.weekday().number_days_from_monday());
    date.checked_sub(Duration::days(offset)).unwrap_or(Date::MIN)
}

fn quarter_first_month(month: Month) -> Month {
    match month {
        Month::January | Month::February | Month::March => Month::January,
        Month::April | Month::May | Month::June => Month::April,
        Month::July | Month::August | Month::September => Month::July,
        Month::October | Month::November | Month::December => Month::October,
    }
}

fn month_start(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, 1).unwrap_or(Date::MIN)
}

fn month_end(year: i32, month: Month) -> Date {
    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        other => (year, other.next()),
    };
    Date::from_calendar_date(next_year, next_month, 1)
        .ok()
        .and_then(Date::previous_day)
        .unwrap_or(Date::MAX)
}
