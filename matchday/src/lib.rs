//! Match resolution and forecast settlement.
//!
//! Given a recorded forecast about a fixture, find the authoritative finished
//! event among provider listings and settle the forecast against it:
//!
//! - [`teams`]: team-name normalization and fuzzy comparison
//! - [`classify`]: routing a forecast to a sport domain
//! - [`window`]: date-window search over a provider
//! - [`outcome`]: terminal-status filtering and orientation detection
//! - [`settlement`]: HIT/MISS and value-bet settlement

pub mod classify;
pub mod outcome;
pub mod provider;
pub mod settlement;
pub mod teams;
pub mod types;
pub mod vocab;
pub mod window;

pub use classify::SportClassifier;
pub use outcome::OutcomeResolver;
pub use provider::{EventProvider, ProviderSet};
pub use settlement::{SettlementEngine, SettlementResult};
pub use teams::TeamMatcher;
pub use types::{
    Forecast, ForecastState, Outcome, RawProviderEvent, ResolvedMatch, Side, SportDomain,
};
pub use vocab::{AliasTable, SportVocabulary};
pub use window::{DateWindowSearch, SearchOutcome};
