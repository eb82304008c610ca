pub mod classify;
pub mod compliance;
pub mod config;
pub mod error;
pub mod group;
pub mod oil_change;
pub mod policy;
pub mod reading;
pub mod report;
pub mod temperature;
pub mod trend;
pub mod venue;
pub mod window;
