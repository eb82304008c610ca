use crate::classify::{format_signed_pct, is_within_temp_band};
use crate::compliance::percent;
use crate::policy::TemperatureBand;
use crate::reading::Reading;
use serde::Serialize;

/// Temperature-control statistics over readings that carry both set and actual
/// temperatures. Readings missing either are left out of every denominator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub sample_count: u32,
    pub avg_signed_variance: Option<f64>,
    /// Display form of `avg_signed_variance`, e.g. "+2.8%".
    pub avg_signed_variance_label: Option<String>,
    pub avg_abs_variance: Option<f64>,
    /// Percent of samples within the control band.
    pub control_rate: Option<f64>,
    /// Percent of samples within the stricter "good" band.
    pub good_control_rate: Option<f64>,
}

pub fn aggregate_temperature<'a, I>(readings: I, band: &TemperatureBand) -> TemperatureStats
where
    I: IntoIterator<Item = &'a Reading>,
{
    let variances: Vec<f64> = readings
        .into_iter()
        .filter_map(Reading::temp_variance_pct)
        .collect();

    if variances.is_empty() {
        return TemperatureStats {
            sample_count: 0,
            avg_signed_variance: None,
            avg_signed_variance_label: None,
            avg_abs_variance: None,
            control_rate: None,
            good_control_rate: None,
        };
    }

    let count = variances.len();
    let signed = variances.iter().sum::<f64>() / count as f64;
    let absolute = variances.iter().map(|v| v.abs()).sum::<f64>() / count as f64;
    let within = |band_pct: f64| {
        variances
            .iter()
            .filter(|v| is_within_temp_band(**v, band_pct))
            .count()
    };

    TemperatureStats {
        sample_count: count as u32,
        avg_signed_variance: Some(signed),
        avg_signed_variance_label: Some(format_signed_pct(signed)),
        avg_abs_variance: Some(absolute),
        control_rate: Some(percent(within(band.band_pct()), count)),
        good_control_rate: Some(percent(within(band.good_band_pct()), count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn with_temps(sequence: u64, set: f64, actual: f64) -> Reading {
        Reading::new("v1", 1, date!(2025 - 03 - 01), sequence).with_temperatures(set, actual)
    }

    #[test]
    fn single_reading_within_band() {
        let readings = vec![with_temps(1, 180.0, 185.0)];
        let stats = aggregate_temperature(&readings, &TemperatureBand::default());

        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.control_rate, Some(100.0));
        assert_eq!(stats.good_control_rate, Some(100.0));
        assert_eq!(stats.avg_signed_variance_label.as_deref(), Some("+2.8%"));
    }

    #[test]
    fn signed_and_absolute_means_differ() {
        // +10% and -10%
        let readings = vec![with_temps(1, 200.0, 220.0), with_temps(2, 200.0, 180.0)];
        let stats = aggregate_temperature(&readings, &TemperatureBand::default());

        let signed = stats.avg_signed_variance.unwrap_or(f64::NAN);
        let absolute = stats.avg_abs_variance.unwrap_or(f64::NAN);
        assert!(signed.abs() < 1e-9);
        assert!((absolute - 10.0).abs() < 1e-9);
        assert_eq!(stats.avg_signed_variance_label.as_deref(), Some("0%"));
        assert_eq!(stats.control_rate, Some(0.0));
    }

    #[test]
    fn missing_temperatures_are_excluded_not_failed() {
        let mut partial = Reading::new("v1", 1, date!(2025 - 03 - 01), 2);
        partial.set_temperature = Some(180.0);
        let readings = vec![
            with_temps(1, 180.0, 181.0),
            partial,
            with_temps(3, 180.0, 190.0).not_in_use(),
        ];
        let stats = aggregate_temperature(&readings, &TemperatureBand::default());

        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.control_rate, Some(100.0));
    }

    #[test]
    fn empty_input_reports_no_data() {
        let readings: Vec<Reading> = Vec::new();
        let stats = aggregate_temperature(&readings, &TemperatureBand::default());
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.avg_signed_variance, None);
        assert_eq!(stats.control_rate, None);
    }

    #[test]
    fn good_band_is_stricter() -> Result<(), crate::error::ConfigurationError> {
        // +5% is inside 7% but outside 3%
        let readings = vec![with_temps(1, 200.0, 210.0), with_temps(2, 200.0, 202.0)];
        let stats = aggregate_temperature(&readings, &TemperatureBand::new(7.0, 3.0)?);

        assert_eq!(stats.control_rate, Some(100.0));
        assert_eq!(stats.good_control_rate, Some(50.0));
        Ok(())
    }
}
