//! Date-window search for the provider event behind a forecast.
//!
//! Recorded kickoff times drift from the provider's event date (timezones,
//! data entry), so the search walks a fixed list of day offsets and ranks the
//! candidates found on each date.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::provider::ProviderSet;
use crate::teams::TeamMatcher;
use crate::types::{RawProviderEvent, SportDomain};

/// Day offsets from the recorded kickoff date, in query order. Forward offsets
/// first since forecasts are usually written ahead of the fixture.
pub const DATE_OFFSETS: [i64; 5] = [0, 1, 2, 3, -1];

/// Minimum mean team similarity for an event to count as the fixture.
pub const MIN_PAIR_SCORE: f64 = 0.5;

const TIE_EPSILON: f64 = 1e-9;

/// Result of a window search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(RawProviderEvent),
    /// Several distinct fixtures scored equally well on `date`
    Ambiguous {
        date: NaiveDate,
        candidates: Vec<RawProviderEvent>,
    },
    NotFound,
}

/// Ranking of the events listed for a single date.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate<'e> {
    Best(&'e RawProviderEvent, f64),
    Tied(Vec<&'e RawProviderEvent>),
    None,
}

pub struct DateWindowSearch<'a> {
    matcher: &'a TeamMatcher,
    min_pair_score: f64,
}

impl<'a> DateWindowSearch<'a> {
    pub fn new(matcher: &'a TeamMatcher) -> Self {
        Self { matcher, min_pair_score: MIN_PAIR_SCORE }
    }

    pub fn with_min_pair_score(mut self, min_pair_score: f64) -> Self {
        self.min_pair_score = min_pair_score;
        self
    }

    /// Query the domain's provider once per offset, stopping at the first date
    /// with an acceptable candidate. Provider failures propagate.
    pub async fn find_event(
        &self,
        providers: &ProviderSet,
        domain: SportDomain,
        home: &str,
        away: &str,
        kickoff_date: NaiveDate,
        league: Option<&str>,
    ) -> Result<SearchOutcome> {
        let provider = providers
            .get(domain)
            .ok_or_else(|| anyhow!("No provider configured for {}", domain))?;

        for offset in DATE_OFFSETS {
            let Some(date) = kickoff_date.checked_add_signed(Duration::days(offset)) else {
                debug!("[RESOLVE] {} {:+} days is out of range; skipping", kickoff_date, offset);
                continue;
            };
            let events = provider
                .fetch(date, league)
                .await
                .with_context(|| format!("{} fetch for {} failed", provider.name(), date))?;

            match self.best_candidate(home, away, &events) {
                Candidate::Best(event, score) => {
                    debug!(
                        "[RESOLVE] {} vs {} -> {} vs {} on {} (offset {:+}, score {:.2})",
                        home, away, event.provider_home_name, event.provider_away_name,
                        date, offset, score
                    );
                    return Ok(SearchOutcome::Found(event.clone()));
                }
                Candidate::Tied(tied) => {
                    warn!(
                        "[RESOLVE] {} vs {}: {} equally likely fixtures on {}",
                        home, away, tied.len(), date
                    );
                    return Ok(SearchOutcome::Ambiguous {
                        date,
                        candidates: tied.into_iter().cloned().collect(),
                    });
                }
                Candidate::None => {}
            }
        }

        Ok(SearchOutcome::NotFound)
    }

    /// Pair score of an event against the forecast teams, over whichever
    /// orientations pass the boolean predicate. `None` when neither does.
    pub fn pair_score(&self, home: &str, away: &str, event: &RawProviderEvent) -> Option<f64> {
        let m = self.matcher;
        let ph = &event.provider_home_name;
        let pa = &event.provider_away_name;

        let direct = (m.matches(ph, home) && m.matches(pa, away))
            .then(|| (m.similarity(ph, home) + m.similarity(pa, away)) / 2.0);
        let swapped = (m.matches(ph, away) && m.matches(pa, home))
            .then(|| (m.similarity(ph, away) + m.similarity(pa, home)) / 2.0);

        match (direct, swapped) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Highest-scoring event above the threshold. Distinct fixtures sharing
    /// the top score are returned as a tie; repeated listings of the same
    /// fixture are not.
    pub fn best_candidate<'e>(
        &self,
        home: &str,
        away: &str,
        events: &'e [RawProviderEvent],
    ) -> Candidate<'e> {
        let scored: Vec<(&RawProviderEvent, f64)> = events
            .iter()
            .filter_map(|e| self.pair_score(home, away, e).map(|s| (e, s)))
            .filter(|(_, s)| *s >= self.min_pair_score)
            .collect();

        let Some(top) = scored.iter().map(|(_, s)| *s).reduce(f64::max) else {
            return Candidate::None;
        };

        let mut leaders: Vec<&RawProviderEvent> = Vec::new();
        let mut keys: Vec<(String, String)> = Vec::new();
        for &(event, score) in &scored {
            if (top - score).abs() > TIE_EPSILON {
                continue;
            }
            let key = self.fixture_key(event);
            if !keys.contains(&key) {
                keys.push(key);
                leaders.push(event);
            }
        }

        match leaders.len() {
            1 => Candidate::Best(leaders[0], top),
            _ => Candidate::Tied(leaders),
        }
    }

    fn fixture_key(&self, event: &RawProviderEvent) -> (String, String) {
        let mut a = self.matcher.normalize(&event.provider_home_name);
        let mut b = self.matcher.normalize(&event.provider_away_name);
        if b < a {
            std::mem::swap(&mut a, &mut b);
        }
        (a, b)
    }
}
