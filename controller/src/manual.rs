//! Administrative paths: manual score override and forecast import.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use matchday::{Forecast, ForecastState, ResolvedMatch, SettlementEngine, SettlementResult, TeamMatcher};
use std::path::Path;
use tracing::{info, warn};

use crate::storage::ForecastStore;

/// Settle one forecast from a score entered by hand, in the forecast's own
/// home/away orientation. Runs the same settlement as automatic resolution and
/// is accepted from PENDING or NEEDS_MANUAL_REVIEW.
pub fn apply_override(
    store: &ForecastStore,
    matcher: &TeamMatcher,
    id: &str,
    home_score: u32,
    away_score: u32,
    now: DateTime<Utc>,
) -> Result<SettlementResult> {
    let record = store
        .get(id)?
        .with_context(|| format!("No forecast with id {}", id))?;
    let forecast = &record.forecast;
    if forecast.state.is_settled() {
        bail!("Forecast {} is already settled as {}", id, forecast.state);
    }

    let (home, away) = forecast
        .recorded_teams()
        .unwrap_or_else(|| (forecast.match_label.clone(), String::new()));
    let resolved = ResolvedMatch {
        actual_home_team: home,
        actual_away_team: away,
        home_score,
        away_score,
        orientation_swapped: false,
    };
    let result = SettlementEngine::new(matcher).settle(forecast, &resolved);

    if !store.settle_manual(id, &result, now)? {
        bail!("Forecast {} changed state while the override was applied", id);
    }
    if forecast.state == ForecastState::NeedsManualReview {
        info!(
            "[OVERRIDE] {} released from review ({})",
            id,
            record.review_reason.as_deref().unwrap_or("no reason recorded")
        );
    }
    info!(
        "[OVERRIDE] {} {} {}-{} -> {}",
        id, forecast.match_label, home_score, away_score, result.outcome
    );
    Ok(result)
}

/// Parse "2-1" / "2:1" into (home, away).
pub fn parse_score(s: &str) -> Result<(u32, u32)> {
    let (h, a) = s
        .trim()
        .split_once(['-', ':'])
        .with_context(|| format!("Score {:?} is not of the form HOME-AWAY", s))?;
    let home = h.trim().parse().with_context(|| format!("Bad home score in {:?}", s))?;
    let away = a.trim().parse().with_context(|| format!("Bad away score in {:?}", s))?;
    Ok((home, away))
}

/// Result of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Ids already in the store
    pub duplicates: usize,
    /// Entries that were not usable forecasts
    pub rejected: usize,
}

/// Load a JSON array of forecasts into the store. Existing ids are left
/// untouched; entries with no id or no match label are rejected.
pub fn import_forecasts<P: AsRef<Path>>(store: &ForecastStore, path: P, now: DateTime<Utc>) -> Result<ImportSummary> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read forecast file {}", path.display()))?;
    let forecasts: Vec<Forecast> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse forecast file {}", path.display()))?;

    let mut summary = ImportSummary::default();
    for forecast in &forecasts {
        if forecast.id.trim().is_empty() || forecast.match_label.trim().is_empty() {
            warn!("[STORE] Rejected forecast without id or match label: {:?}", forecast.match_label);
            summary.rejected += 1;
            continue;
        }
        if store.insert(forecast, now)? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    info!(
        "[STORE] Imported {} from {} ({} duplicates, {} rejected)",
        summary.inserted,
        path.display(),
        summary.duplicates,
        summary.rejected
    );
    Ok(summary)
}
