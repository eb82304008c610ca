//! Ingestion boundary for readings exported by the reading store.
//!
//! Store exports are loosely typed: `oilAge` arrives as `1` or `"1"`, `filtered`
//! as `true`, `"true"` or `1`. Everything is normalized into a strict
//! [`Reading`] here so the engine never sees the ambiguity.

use crate::reading::{FryerNumber, Reading, Sequence};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::{debug, warn};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseFlag {
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    pub venue_id: Option<String>,
    pub fryer_number: Option<LooseNumber>,
    pub reading_date: Option<String>,
    pub sequence: Option<LooseNumber>,
    pub oil_age: Option<LooseNumber>,
    pub tpm_value: Option<LooseNumber>,
    pub set_temperature: Option<LooseNumber>,
    pub actual_temperature: Option<LooseNumber>,
    pub filtered: Option<LooseFlag>,
    pub litres_filled: Option<LooseNumber>,
    pub food_type: Option<String>,
    pub notes: Option<String>,
    pub not_in_use: Option<LooseFlag>,
    pub staff_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid reading date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("invalid number for `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid flag for `{field}`: {value}")]
    InvalidFlag { field: &'static str, value: String },
    #[error("fryer number must be positive")]
    FryerNumberZero,
    #[error("`{field}` must not be negative: {value}")]
    Negative { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedReading {
    /// Position of the record in the input batch.
    pub index: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub readings: Vec<Reading>,
    pub rejected: Vec<RejectedReading>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read readings file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse readings file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn load_readings_from_path(path: impl AsRef<Path>) -> Result<IngestReport, IngestError> {
    let contents = std::fs::read_to_string(path)?;
    parse_readings(&contents)
}

/// Parse a JSON array of store records and normalize each one.
pub fn parse_readings(json: &str) -> Result<IngestReport, IngestError> {
    let raw: Vec<RawReading> = serde_json::from_str(json)?;
    Ok(normalize_all(raw))
}

/// Normalize a batch, keeping good records and reporting the rest.
pub fn normalize_all(raw: Vec<RawReading>) -> IngestReport {
    let mut report = IngestReport::default();
    for (index, record) in raw.into_iter().enumerate() {
        match normalize(record) {
            Ok(reading) => report.readings.push(reading),
            Err(reason) => {
                warn!(index, reason = %reason, "Rejected reading record");
                report.rejected.push(RejectedReading { index, reason });
            }
        }
    }
    debug!(
        accepted = report.readings.len(),
        rejected = report.rejected.len(),
        "Readings normalized"
    );
    report
}

pub fn normalize(raw: RawReading) -> Result<Reading, RejectReason> {
    let venue_id = non_empty(raw.venue_id).ok_or(RejectReason::MissingField("venueId"))?;

    let fryer_number = required(raw.fryer_number, "fryerNumber")
        .and_then(|value| whole_number(&value, "fryerNumber"))?;
    let fryer_number =
        FryerNumber::try_from(fryer_number).map_err(|_| RejectReason::InvalidNumber {
            field: "fryerNumber",
            value: fryer_number.to_string(),
        })?;
    if fryer_number == 0 {
        return Err(RejectReason::FryerNumberZero);
    }

    let date_text = non_empty(raw.reading_date).ok_or(RejectReason::MissingField("readingDate"))?;
    let reading_date = parse_date(&date_text)?;

    let sequence: Sequence = required(raw.sequence, "sequence")
        .and_then(|value| whole_number(&value, "sequence"))?;

    let not_in_use = match raw.not_in_use {
        Some(flag) => flag_value(&flag, "notInUse")?.unwrap_or(false),
        None => false,
    };

    let mut reading = Reading::new(venue_id, fryer_number, reading_date, sequence);
    reading.food_type = non_empty(raw.food_type);
    reading.notes = non_empty(raw.notes);
    reading.staff_name = non_empty(raw.staff_name);

    if not_in_use {
        return Ok(reading.not_in_use());
    }

    reading.oil_age = match raw.oil_age {
        Some(value) => optional_whole_number(&value, "oilAge")?
            .map(|age| {
                u32::try_from(age).map_err(|_| RejectReason::InvalidNumber {
                    field: "oilAge",
                    value: age.to_string(),
                })
            })
            .transpose()?,
        None => None,
    };
    reading.tpm_value = optional_measure(raw.tpm_value, "tpmValue")?;
    reading.set_temperature = optional_measure(raw.set_temperature, "setTemperature")?;
    reading.actual_temperature = optional_measure(raw.actual_temperature, "actualTemperature")?;
    reading.litres_filled = optional_measure(raw.litres_filled, "litresFilled")?;
    reading.filtered = match raw.filtered {
        Some(flag) => flag_value(&flag, "filtered")?,
        None => None,
    };
    if reading.is_fresh_oil() {
        reading.filtered = Some(true);
    }

    Ok(reading)
}

pub fn parse_date(text: &str) -> Result<Date, RejectReason> {
    Date::parse(text.trim(), DATE_FORMAT).map_err(|_| RejectReason::InvalidDate(text.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn required(
    value: Option<LooseNumber>,
    field: &'static str,
) -> Result<LooseNumber, RejectReason> {
    value.ok_or(RejectReason::MissingField(field))
}

fn number_value(value: &LooseNumber, field: &'static str) -> Result<Option<f64>, RejectReason> {
    let invalid = |text: String| RejectReason::InvalidNumber { field, value: text };
    match value {
        LooseNumber::Number(number) if number.is_finite() => Ok(Some(*number)),
        LooseNumber::Number(number) => Err(invalid(number.to_string())),
        LooseNumber::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(number) if number.is_finite() => Ok(Some(number)),
                _ => Err(invalid(text.clone())),
            }
        }
    }
}

fn optional_whole_number(
    value: &LooseNumber,
    field: &'static str,
) -> Result<Option<u64>, RejectReason> {
    let Some(number) = number_value(value, field)? else {
        return Ok(None);
    };
    if number < 0.0 {
        return Err(RejectReason::Negative {
            field,
            value: number,
        });
    }
    if number.fract() != 0.0 || number > u64::MAX as f64 {
        return Err(RejectReason::InvalidNumber {
            field,
            value: number.to_string(),
        });
    }
    Ok(Some(number as u64))
}

fn whole_number(value: &LooseNumber, field: &'static str) -> Result<u64, RejectReason> {
    optional_whole_number(value, field)?.ok_or(RejectReason::MissingField(field))
}

fn optional_measure(
    value: Option<LooseNumber>,
    field: &'static str,
) -> Result<Option<f64>, RejectReason> {
    let Some(value) = value else {
        return Ok(None);
    };
    let number = number_value(&value, field)?;
    if let Some(number) = number
        && number < 0.0
    {
        return Err(RejectReason::Negative {
            field,
            value: number,
        });
    }
    Ok(number)
}

fn flag_value(flag: &LooseFlag, field: &'static str) -> Result<Option<bool>, RejectReason> {
    match flag {
        LooseFlag::Bool(value) => Ok(Some(*value)),
        LooseFlag::Number(number) if *number == 1.0 => Ok(Some(true)),
        LooseFlag::Number(number) if *number == 0.0 => Ok(Some(false)),
        LooseFlag::Number(number) => Err(RejectReason::InvalidFlag {
            field,
            value: number.to_string(),
        }),
        LooseFlag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(RejectReason::InvalidFlag {
                field,
                value: text.clone(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn string_and_numeric_oil_age_normalize_identically() -> Result<(), IngestError> {
        let report = parse_readings(
            r#"[
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 1, "oilAge": "1", "tpmValue": "5"},
                {"venueId": "v1", "fryerNumber": 2, "readingDate": "2025-03-01", "sequence": 2, "oilAge": 1, "tpmValue": 5}
            ]"#,
        )?;

        assert!(report.rejected.is_empty());
        assert_eq!(report.readings.len(), 2);
        for reading in &report.readings {
            assert_eq!(reading.oil_age, Some(1));
            assert_eq!(reading.tpm_value, Some(5.0));
            assert_eq!(reading.filtered, Some(true));
            assert!(reading.is_fresh_oil());
        }
        Ok(())
    }

    #[test]
    fn filtered_accepts_loose_flags() -> Result<(), IngestError> {
        let report = parse_readings(
            r#"[
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 1, "filtered": "true"},
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 2, "filtered": 0},
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 3, "filtered": null}
            ]"#,
        )?;

        let flags: Vec<Option<bool>> = report.readings.iter().map(|r| r.filtered).collect();
        assert_eq!(flags, vec![Some(true), Some(false), None]);
        Ok(())
    }

    #[test]
    fn not_in_use_drops_numeric_fields() -> Result<(), IngestError> {
        let report = parse_readings(
            r#"[{"venueId": "v1", "fryerNumber": 3, "readingDate": "2025-03-02", "sequence": 4,
                 "notInUse": true, "tpmValue": 22, "oilAge": 4, "staffName": "Sam"}]"#,
        )?;

        let reading = &report.readings[0];
        assert!(reading.not_in_use);
        assert_eq!(reading.tpm_value, None);
        assert_eq!(reading.oil_age, None);
        assert_eq!(reading.staff_name.as_deref(), Some("Sam"));
        assert_eq!(reading.reading_date, date!(2025 - 03 - 02));
        Ok(())
    }

    #[test]
    fn bad_records_are_rejected_and_batch_continues() -> Result<(), IngestError> {
        let report = parse_readings(
            r#"[
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "03/01/2025", "sequence": 1},
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01"},
                {"venueId": "v1", "fryerNumber": 0, "readingDate": "2025-03-01", "sequence": 3},
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 4, "litresFilled": -2},
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 5, "tpmValue": "high"},
                {"venueId": "v1", "fryerNumber": 1, "readingDate": "2025-03-01", "sequence": 6, "tpmValue": 12.5}
            ]"#,
        )?;

        assert_eq!(report.readings.len(), 1);
        assert_eq!(report.readings[0].sequence, 6);

        let reasons: Vec<(usize, RejectReason)> = report
            .rejected
            .into_iter()
            .map(|rejected| (rejected.index, rejected.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (0, RejectReason::InvalidDate("03/01/2025".to_string())),
                (1, RejectReason::MissingField("sequence")),
                (2, RejectReason::FryerNumberZero),
                (
                    3,
                    RejectReason::Negative {
                        field: "litresFilled",
                        value: -2.0
                    }
                ),
                (
                    4,
                    RejectReason::InvalidNumber {
                        field: "tpmValue",
                        value: "high".to_string()
                    }
                ),
            ]
        );
        Ok(())
    }

    #[test]
    fn malformed_json_returns_parse_error() {
        let result = parse_readings("not json");
        assert!(matches!(result, Err(IngestError::Parse(_))));
    }

    #[test]
    fn missing_file_returns_read_error() {
        let path = std::env::temp_dir().join("oil-analytics-missing-readings.json");
        let result = load_readings_from_path(&path);
        assert!(matches!(result, Err(IngestError::Read(_))));
    }
}
