use clap::{Parser, ValueEnum};
use oil_analytics::config;
use oil_analytics::error::AppError;
use oil_analytics::reading::ingest;
use oil_analytics::report;
use oil_analytics::window::WindowPreset;
use std::path::PathBuf;
use time::{Date, OffsetDateTime};

#[derive(Parser, Debug)]
#[command(name = "oil-analytics")]
#[command(about = "Fryer oil quality and lifecycle analytics")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (default: "config/config.toml")
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Readings JSON file, overriding [input].readings_path
    #[arg(long)]
    readings: Option<PathBuf>,

    /// Report date as YYYY-MM-DD (default: today, UTC)
    #[arg(long, value_parser = parse_date_arg)]
    today: Option<Date>,

    /// Report on the calendar period containing the report date instead of
    /// the trailing [analytics].window_days
    #[arg(long, value_enum)]
    period: Option<Period>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Period {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl From<Period> for WindowPreset {
    fn from(period: Period) -> Self {
        match period {
            Period::Day => WindowPreset::Day,
            Period::Week => WindowPreset::Week,
            Period::Month => WindowPreset::Month,
            Period::Quarter => WindowPreset::Quarter,
            Period::Year => WindowPreset::Year,
        }
    }
}

fn parse_date_arg(text: &str) -> Result<Date, String> {
    ingest::parse_date(text).map_err(|err| err.to_string())
}

fn init_tracing(level: &str) {
    let max_level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<(), AppError> {
    let args = CliArgs::parse();
    let config = match &args.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load_default()?,
    };
    init_tracing(config.log_level());
    tracing::info!(app = %config.app.name, "oil-analytics starting");

    let settings = config.analytics_settings()?;
    let venues = config.venues()?;
    let today = args.today.unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let readings_path = args
        .readings
        .clone()
        .unwrap_or_else(|| config.readings_path().to_path_buf());
    let ingested = ingest::load_readings_from_path(&readings_path)?;
    tracing::info!(
        path = %readings_path.display(),
        accepted = ingested.readings.len(),
        rejected = ingested.rejected.len(),
        "Readings loaded"
    );
    if !ingested.rejected.is_empty() {
        tracing::warn!(
            rejected = ingested.rejected.len(),
            "Some reading records were rejected and left out of the report"
        );
    }

    let report = match args.period {
        Some(period) => {
            let window = WindowPreset::from(period).window(today);
            report::build_report_in(
                venues,
                config.groups(),
                &ingested.readings,
                &settings,
                &window,
                today,
            )?
        }
        None => report::build_report(
            venues,
            config.groups(),
            &ingested.readings,
            &settings,
            today,
        )?,
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
