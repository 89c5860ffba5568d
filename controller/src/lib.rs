//! Settlement controller: resolves recorded forecasts against API-Sports
//! results and settles them in a SQLite store.
//!
//! The binary crate is `controller`; this library is `settle_bot` so the
//! integration tests can drive passes against mock providers.

pub mod api_sports;
pub mod config;
pub mod manual;
pub mod paths;
pub mod resolution;
pub mod storage;
