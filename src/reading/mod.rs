use crate::classify;
use serde::{Deserialize, Serialize};
use time::Date;

pub mod ingest;

pub type VenueId = String;
pub type FryerNumber = u32;
pub type Sequence = u64;

/// A single recorded fryer check. Readings are immutable facts once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub venue_id: VenueId,
    pub fryer_number: FryerNumber,
    pub reading_date: Date,
    /// Orders readings taken for the same fryer on the same day.
    pub sequence: Sequence,
    pub oil_age: Option<u32>,
    pub tpm_value: Option<f64>,
    pub set_temperature: Option<f64>,
    pub actual_temperature: Option<f64>,
    pub filtered: Option<bool>,
    pub litres_filled: Option<f64>,
    pub food_type: Option<String>,
    pub notes: Option<String>,
    pub not_in_use: bool,
    pub staff_name: Option<String>,
}

impl Reading {
    /// An in-use reading with no measurements yet.
    pub fn new(
        venue_id: impl Into<VenueId>,
        fryer_number: FryerNumber,
        reading_date: Date,
        sequence: Sequence,
    ) -> Self {
        Self {
            venue_id: venue_id.into(),
            fryer_number,
            reading_date,
            sequence,
            oil_age: None,
            tpm_value: None,
            set_temperature: None,
            actual_temperature: None,
            filtered: None,
            litres_filled: None,
            food_type: None,
            notes: None,
            not_in_use: false,
            staff_name: None,
        }
    }

    pub fn with_tpm(mut self, tpm: f64) -> Self {
        self.tpm_value = Some(tpm);
        self
    }

    pub fn with_oil_age(mut self, days: u32) -> Self {
        self.oil_age = Some(days);
        self
    }

    /// Marks the oil as changed on this reading's date.
    pub fn fresh_oil(self) -> Self {
        self.with_oil_age(1).with_filtered(true)
    }

    pub fn with_filtered(mut self, filtered: bool) -> Self {
        self.filtered = Some(filtered);
        self
    }

    pub fn with_temperatures(mut self, set: f64, actual: f64) -> Self {
        self.set_temperature = Some(set);
        self.actual_temperature = Some(actual);
        self
    }

    pub fn with_litres(mut self, litres: f64) -> Self {
        self.litres_filled = Some(litres);
        self
    }

    /// Turns the reading into an attendance-only "not in use" marker.
    pub fn not_in_use(mut self) -> Self {
        self.not_in_use = true;
        self.oil_age = None;
        self.tpm_value = None;
        self.set_temperature = None;
        self.actual_temperature = None;
        self.filtered = None;
        self.litres_filled = None;
        self
    }

    pub fn is_fresh_oil(&self) -> bool {
        classify::is_fresh_oil(self)
    }

    /// TPM that may enter quality aggregates.
    pub fn tpm(&self) -> Option<f64> {
        if self.not_in_use {
            return None;
        }
        self.tpm_value.filter(|tpm| tpm.is_finite())
    }

    /// Filtering state, with fresh oil counting as filtered.
    pub fn filtered_state(&self) -> Option<bool> {
        if self.not_in_use {
            return None;
        }
        if self.is_fresh_oil() {
            return Some(true);
        }
        self.filtered
    }

    /// Signed percentage deviation of actual from set temperature.
    pub fn temp_variance_pct(&self) -> Option<f64> {
        if self.not_in_use {
            return None;
        }
        classify::temp_variance_pct(self.set_temperature, self.actual_temperature)
    }

    pub fn litres(&self) -> f64 {
        if self.not_in_use {
            return 0.0;
        }
        self.litres_filled.filter(|l| l.is_finite() && *l > 0.0).unwrap_or(0.0)
    }

    /// Ordering key for "most recent reading": date first, then sequence.
    pub fn recency_key(&self) -> (Date, Sequence) {
        (self.reading_date, self.sequence)
    }
}

/// Most recent reading by (date, sequence); input order is irrelevant.
pub fn latest<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Option<&'a Reading> {
    readings.into_iter().max_by_key(|reading| reading.recency_key())
}
