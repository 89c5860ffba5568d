//! Resolution passes: find, settle or park every due forecast.
//!
//! Forecasts are processed one at a time with a fixed pause between them to
//! stay inside provider rate limits. Every failure is contained to the forecast
//! it happened on; a pass only fails when the store cannot list due work.

use anyhow::Result;
use chrono::{DateTime, Utc};
use matchday::{
    DateWindowSearch, Forecast, Outcome, OutcomeResolver, ProviderSet, SearchOutcome,
    SettlementEngine, SettlementResult, SportClassifier, SportDomain, SportVocabulary,
    TeamMatcher, AliasTable,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api_sports;
use crate::config;
use crate::storage::{ForecastRecord, ForecastStore};

/// Tunables for a resolution pass
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Pause between forecasts
    pub delay: Duration,
    pub lease_ttl_secs: i64,
    /// Unproductive attempts before a forecast is parked (0 = never)
    pub max_attempts: u32,
    /// Days past kickoff before a forecast is parked (0 = never)
    pub max_days_past_kickoff: i64,
    pub min_pair_score: f64,
    /// Lease owner id for this process
    pub owner: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
            lease_ttl_secs: 600,
            max_attempts: 48,
            max_days_past_kickoff: 7,
            min_pair_score: matchday::window::MIN_PAIR_SCORE,
            owner: default_owner(),
        }
    }
}

fn default_owner() -> String {
    format!("controller-{}", std::process::id())
}

impl ResolverSettings {
    pub fn from_env() -> Self {
        Self {
            delay: Duration::from_millis(config::resolution_delay_ms()),
            lease_ttl_secs: config::lease_ttl_secs(),
            max_attempts: config::max_resolution_attempts(),
            max_days_past_kickoff: config::max_days_past_kickoff(),
            min_pair_score: config::min_pair_score(),
            owner: default_owner(),
        }
    }

    /// Reason to park a forecast that is still unresolved, if any.
    pub fn dead_letter_reason(&self, attempts: u32, kickoff: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
        if self.max_attempts > 0 && attempts >= self.max_attempts {
            return Some(format!("unresolved after {} attempts", attempts));
        }
        let days = (now - kickoff).num_days();
        if self.max_days_past_kickoff > 0 && days >= self.max_days_past_kickoff {
            return Some(format!("unresolved {} days after kickoff", days));
        }
        None
    }
}

/// Everything a pass needs besides the store.
pub struct ResolutionContext {
    pub matcher: TeamMatcher,
    pub classifier: SportClassifier,
    pub providers: ProviderSet,
}

impl ResolutionContext {
    pub fn new(matcher: TeamMatcher, classifier: SportClassifier, providers: ProviderSet) -> Self {
        Self { matcher, classifier, providers }
    }

    /// Lookup tables from their configured files (built-ins otherwise) and one
    /// API-Sports client per family with a key.
    pub fn from_env() -> Result<Self> {
        let aliases = AliasTable::load_or_builtin(config::team_aliases_path());
        let vocab = SportVocabulary::load_or_builtin(config::sport_vocab_path());
        info!("[RESOLVE] {} team aliases, sport vocabulary v{}", aliases.len(), vocab.version);
        Ok(Self::new(
            TeamMatcher::new(aliases),
            SportClassifier::new(vocab),
            api_sports::build_provider_set()?,
        ))
    }
}

/// What automatic resolution made of one forecast
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Settled(SettlementResult),
    /// No finished event yet
    NotYet,
    /// Distinct fixtures matched equally well
    Ambiguous(usize),
    Unclassified,
    NoProvider(SportDomain),
    /// Label has no recognizable home/away split
    UnreadableLabel,
}

/// Classify, search, resolve and settle one forecast. Pure apart from
/// provider queries; provider failures come back as `Err`.
pub async fn resolve_forecast(
    ctx: &ResolutionContext,
    settings: &ResolverSettings,
    forecast: &Forecast,
) -> Result<Resolution> {
    let Some((home, away)) = forecast.recorded_teams() else {
        return Ok(Resolution::UnreadableLabel);
    };

    let domain = ctx.classifier.classify(forecast);
    if domain == SportDomain::Unknown {
        return Ok(Resolution::Unclassified);
    }
    if ctx.providers.get(domain).is_none() {
        return Ok(Resolution::NoProvider(domain));
    }

    let league = Some(forecast.league.trim()).filter(|l| !l.is_empty());
    let search = DateWindowSearch::new(&ctx.matcher).with_min_pair_score(settings.min_pair_score);
    let found = search
        .find_event(&ctx.providers, domain, &home, &away, forecast.kickoff.date_naive(), league)
        .await?;

    let event = match found {
        SearchOutcome::Found(event) => event,
        SearchOutcome::Ambiguous { candidates, .. } => return Ok(Resolution::Ambiguous(candidates.len())),
        SearchOutcome::NotFound => return Ok(Resolution::NotYet),
    };

    let Some(resolved) = OutcomeResolver::new(&ctx.matcher).resolve(domain, &home, &away, &event) else {
        return Ok(Resolution::NotYet);
    };

    Ok(Resolution::Settled(SettlementEngine::new(&ctx.matcher).settle(forecast, &resolved)))
}

/// Tally of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub due: usize,
    pub settled: usize,
    pub hits: usize,
    pub misses: usize,
    /// Looked for, not found yet
    pub pending: usize,
    /// Not attempted this pass (no classification or provider)
    pub skipped: usize,
    /// Leased by another run, or settled by one mid-pass
    pub busy: usize,
    /// Provider or store failures; the forecast stays PENDING
    pub errors: usize,
    /// Moved to NEEDS_MANUAL_REVIEW this pass
    pub parked: usize,
}

enum Disposition {
    Settled(Outcome),
    Pending,
    Skipped,
    Busy,
    Parked,
    Failed,
}

/// One pass over every due forecast.
pub async fn run_pass(
    ctx: &ResolutionContext,
    store: &ForecastStore,
    settings: &ResolverSettings,
    now: DateTime<Utc>,
) -> Result<PassSummary> {
    run_pass_until(ctx, store, settings, now, &AtomicBool::new(false)).await
}

/// Like [`run_pass`], stopping between forecasts once `stop` is set.
pub async fn run_pass_until(
    ctx: &ResolutionContext,
    store: &ForecastStore,
    settings: &ResolverSettings,
    now: DateTime<Utc>,
    stop: &AtomicBool,
) -> Result<PassSummary> {
    let due = store.pending_due(now)?;
    let mut summary = PassSummary { due: due.len(), ..Default::default() };
    info!("[RESOLVE] Pass started: {} forecasts due", due.len());

    let started = Utc::now();
    for (i, record) in due.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            info!("[RESOLVE] Stop requested; {} forecasts left for the next pass", due.len() - i);
            break;
        }
        if i > 0 && !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }

        // Leases run on wall-clock time elapsed since the pass began
        let claim_at = now + (Utc::now() - started);
        match process(ctx, store, settings, record, now, claim_at).await {
            Disposition::Settled(outcome) => {
                summary.settled += 1;
                match outcome {
                    Outcome::Hit => summary.hits += 1,
                    Outcome::Miss => summary.misses += 1,
                }
            }
            Disposition::Pending => summary.pending += 1,
            Disposition::Skipped => summary.skipped += 1,
            Disposition::Busy => summary.busy += 1,
            Disposition::Parked => summary.parked += 1,
            Disposition::Failed => summary.errors += 1,
        }
    }

    info!(
        "[RESOLVE] Pass done: due={} settled={} (hit={} miss={}) pending={} skipped={} busy={} parked={} errors={}",
        summary.due, summary.settled, summary.hits, summary.misses, summary.pending,
        summary.skipped, summary.busy, summary.parked, summary.errors
    );
    Ok(summary)
}

async fn process(
    ctx: &ResolutionContext,
    store: &ForecastStore,
    settings: &ResolverSettings,
    record: &ForecastRecord,
    now: DateTime<Utc>,
    claim_at: DateTime<Utc>,
) -> Disposition {
    let id = record.forecast.id.as_str();

    match store.claim(id, &settings.owner, claim_at, settings.lease_ttl_secs) {
        Ok(true) => {}
        Ok(false) => return Disposition::Busy,
        Err(e) => {
            warn!("[STORE] Could not claim {}: {:#}", id, e);
            return Disposition::Failed;
        }
    }

    let disposition = match settle_claimed(ctx, store, settings, record, now).await {
        Ok(d) => d,
        Err(e) => {
            warn!("[STORE] {} left pending: {:#}", id, e);
            Disposition::Failed
        }
    };

    if let Err(e) = store.release(id, &settings.owner) {
        warn!("[STORE] Could not release {}: {:#}", id, e);
    }
    disposition
}

async fn settle_claimed(
    ctx: &ResolutionContext,
    store: &ForecastStore,
    settings: &ResolverSettings,
    record: &ForecastRecord,
    now: DateTime<Utc>,
) -> Result<Disposition> {
    let forecast = &record.forecast;
    let id = forecast.id.as_str();

    let resolution = match resolve_forecast(ctx, settings, forecast).await {
        Ok(r) => r,
        Err(e) => {
            // Provider trouble is not the forecast's fault: no attempt is counted
            warn!("[PROVIDER] {} ({}): {:#}", id, forecast.match_label, e);
            return Ok(Disposition::Failed);
        }
    };

    let unclassified = resolution == Resolution::Unclassified;
    match resolution {
        Resolution::Settled(result) => {
            if store.settle(id, &result, now)? {
                info!(
                    "[RESOLVE] {} {} -> {} ({} {})",
                    id, forecast.match_label, result.outcome, result.actual_result, result.actual_score
                );
                Ok(Disposition::Settled(result.outcome))
            } else {
                debug!("[RESOLVE] {} was settled elsewhere", id);
                Ok(Disposition::Busy)
            }
        }
        Resolution::Ambiguous(n) => {
            let reason = format!("{} fixtures matched equally well", n);
            warn!("[RESOLVE] {} {}: {}; parking for review", id, forecast.match_label, reason);
            store.mark_needs_review(id, &reason)?;
            Ok(Disposition::Parked)
        }
        Resolution::UnreadableLabel => {
            let reason = format!("match label {:?} has no home/away split", forecast.match_label);
            warn!("[RESOLVE] {}: {}; parking for review", id, reason);
            store.mark_needs_review(id, &reason)?;
            Ok(Disposition::Parked)
        }
        Resolution::NoProvider(domain) => {
            debug!("[RESOLVE] {} skipped: no provider for {}", id, domain);
            Ok(Disposition::Skipped)
        }
        Resolution::NotYet | Resolution::Unclassified => {
            let attempts = store.record_attempt(id, now)?;
            if let Some(reason) = settings.dead_letter_reason(attempts, forecast.kickoff, now) {
                warn!("[RESOLVE] {} {}: {}; parking for review", id, forecast.match_label, reason);
                store.mark_needs_review(id, &reason)?;
                return Ok(Disposition::Parked);
            }
            if unclassified {
                debug!("[RESOLVE] {} skipped: sport not recognized ({:?})", id, forecast.match_label);
                Ok(Disposition::Skipped)
            } else {
                debug!("[RESOLVE] {} not finished yet (attempt {})", id, attempts);
                Ok(Disposition::Pending)
            }
        }
    }
}
