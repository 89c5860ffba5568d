//! SQLite persistence for forecasts awaiting settlement.
//!
//! The store is the only shared state between resolution passes: per-forecast
//! leases and conditional updates keep overlapping runs from settling the same
//! forecast twice.

pub mod schema;
pub mod store;

pub use store::{ForecastRecord, ForecastStore};
