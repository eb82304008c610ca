use crate::config::ConfigError;
use crate::reading::ingest::IngestError;
use thiserror::Error;
use time::Date;

/// Rejected engine settings. Raised once, when a policy or window is built.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("threshold must be a finite, non-negative percentage: {0}")]
    InvalidThreshold(f64),
    #[error("warning threshold {warning} must be below critical threshold {critical}")]
    ThresholdOrder { warning: f64, critical: f64 },
    #[error("temperature band must be a finite, non-negative percentage: {0}")]
    InvalidTemperatureBand(f64),
    #[error("window start {start} is after window end {end}")]
    InvertedWindow { start: Date, end: Date },
    #[error("{field} must be at least 1")]
    ZeroLength { field: &'static str },
    #[error("venue {venue_id} must have at least one fryer")]
    NoFryers { venue_id: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("failed to write report: {0}")]
    Output(#[from] serde_json::Error),
}
