use crate::reading::Reading;
use crate::window::{DateWindow, index_by_date};
use serde::Serialize;
use time::Date;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: Date,
    pub reading_count: u32,
    pub avg_tpm: Option<f64>,
    pub max_tpm: Option<f64>,
    /// Mean of the daily averages over the trailing period ending on `date`.
    pub moving_avg_tpm: Option<f64>,
}

/// Daily TPM series across the window (clipped to `today`), one point per date.
pub fn daily_tpm_trend<'a, I>(
    readings: I,
    window: &DateWindow,
    today: Date,
    period_days: u32,
) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let index = index_by_date(
        readings
            .into_iter()
            .filter(|reading| window.contains(reading.reading_date)),
    );

    let daily: Vec<(Date, u32, Option<f64>, Option<f64>)> = window
        .dates(today)
        .into_iter()
        .map(|date| {
            let values: Vec<f64> = index
                .get(&date)
                .map(|day| day.iter().filter_map(|reading| reading.tpm()).collect())
                .unwrap_or_default();
            let count = values.len() as u32;
            let avg = mean(&values);
            let max = values.iter().copied().reduce(f64::max);
            (date, count, avg, max)
        })
        .collect();

    let averages: Vec<Option<f64>> = daily.iter().map(|(_, _, avg, _)| *avg).collect();
    let moving = simple_moving_average(&averages, period_days as usize);

    daily
        .into_iter()
        .zip(moving)
        .map(|((date, reading_count, avg_tpm, max_tpm), moving_avg_tpm)| TrendPoint {
            date,
            reading_count,
            avg_tpm,
            max_tpm,
            moving_avg_tpm,
        })
        .collect()
}

/// Trailing mean over up to `period` values ending at each position, skipping
/// gaps. A position whose whole period is empty has no average.
pub fn simple_moving_average(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let period = period.max(1);
    (0..values.len())
        .map(|end| {
            let start = (end + 1).saturating_sub(period);
            let present: Vec<f64> = values[start..=end].iter().flatten().copied().collect();
            mean(&present)
        })
        .collect()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn moving_average_skips_gaps() {
        let values = vec![Some(10.0), None, Some(20.0), Some(30.0)];
        let sma = simple_moving_average(&values, 2);
        assert_eq!(sma, vec![Some(10.0), Some(10.0), Some(20.0), Some(25.0)]);
    }

    #[test]
    fn moving_average_of_empty_period_is_none() {
        let values = vec![None, None, Some(12.0)];
        assert_eq!(simple_moving_average(&values, 1), vec![None, None, Some(12.0)]);
    }

    #[test]
    fn daily_trend_covers_every_window_date() {
        let readings = vec![
            Reading::new("v1", 1, date!(2025 - 03 - 01), 1).with_tpm(10.0),
            Reading::new("v1", 2, date!(2025 - 03 - 01), 2).with_tpm(14.0),
            Reading::new("v1", 1, date!(2025 - 03 - 03), 3).with_tpm(18.0),
            Reading::new("v1", 1, date!(2025 - 02 - 20), 4).with_tpm(40.0),
        ];
        let window = DateWindow::trailing(date!(2025 - 03 - 03), 3);

        let trend = daily_tpm_trend(&readings, &window, date!(2025 - 03 - 03), 7);

        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].avg_tpm, Some(12.0));
        assert_eq!(trend[0].max_tpm, Some(14.0));
        assert_eq!(trend[1].reading_count, 0);
        assert_eq!(trend[1].avg_tpm, None);
        assert_eq!(trend[1].moving_avg_tpm, Some(12.0));
        assert_eq!(trend[2].moving_avg_tpm, Some(15.0));
    }
}
