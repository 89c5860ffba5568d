//! API-Sports provider families behind the `EventProvider` contract.
//!
//! Each family has its own host, listing path and payload shape; all of them
//! share the `{errors, results, response}` envelope and the same auth header.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use governor::{clock::DefaultClock, middleware::NoOpMiddleware, state::NotKeyed, Quota, RateLimiter};
use matchday::{EventProvider, ProviderSet, RawProviderEvent, SportDomain};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{
    self, get_league_config, ProviderEndpoint, API_SPORTS_AUTH_HEADER, PROVIDER_MAX_ATTEMPTS,
    PROVIDER_TIMEOUT_SECS,
};

pub type ProviderRateLimiter =
    RateLimiter<NotKeyed, governor::state::InMemoryState, DefaultClock, NoOpMiddleware>;

/// Token bucket shared by every client of one family
pub fn family_limiter(requests_per_min: u32) -> Arc<ProviderRateLimiter> {
    let per_min = NonZeroU32::new(requests_per_min).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_min)))
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct Envelope {
    /// `[]` when fine; an object or non-empty array describing the problem otherwise
    #[serde(default)]
    errors: serde_json::Value,
    #[serde(default)]
    response: Vec<serde_json::Value>,
}

fn has_errors(errors: &serde_json::Value) -> bool {
    match errors {
        serde_json::Value::Null => false,
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    short: String,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: Option<u64>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Teams {
    home: Team,
    away: Team,
}

#[derive(Debug, Deserialize)]
struct HomeAway<T> {
    home: T,
    away: T,
}

#[derive(Debug, Deserialize)]
struct Total {
    total: Option<u32>,
}

// football: /fixtures
#[derive(Debug, Deserialize)]
struct FootballFixture {
    fixture: FootballFixtureInfo,
    teams: Teams,
    goals: HomeAway<Option<u32>>,
}

#[derive(Debug, Deserialize)]
struct FootballFixtureInfo {
    date: Option<String>,
    status: Status,
}

// basketball: /games
#[derive(Debug, Deserialize)]
struct BasketballGame {
    date: Option<String>,
    status: Status,
    teams: Teams,
    scores: HomeAway<Total>,
}

// hockey: /games
#[derive(Debug, Deserialize)]
struct HockeyGame {
    date: Option<String>,
    status: Status,
    teams: Teams,
    scores: HomeAway<Option<u32>>,
}

// american-football: /games
#[derive(Debug, Deserialize)]
struct AmericanFootballGame {
    game: AmericanFootballGameInfo,
    teams: Teams,
    scores: HomeAway<Total>,
}

#[derive(Debug, Deserialize)]
struct AmericanFootballGameInfo {
    date: AmericanFootballDate,
    status: Status,
}

#[derive(Debug, Deserialize)]
struct AmericanFootballDate {
    timestamp: Option<i64>,
}

// mma: /fights
#[derive(Debug, Deserialize)]
struct MmaFight {
    date: Option<String>,
    status: Status,
    fighters: MmaFighters,
}

#[derive(Debug, Deserialize)]
struct MmaFighters {
    first: MmaFighter,
    second: MmaFighter,
}

#[derive(Debug, Deserialize)]
struct MmaFighter {
    id: Option<u64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    winner: Option<bool>,
}

fn parse_date(s: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s?).ok().map(|d| d.with_timezone(&Utc))
}

fn id_string(id: Option<u64>) -> Option<String> {
    id.map(|i| i.to_string())
}

fn team_event(teams: Teams, status: Status, scores: (Option<u32>, Option<u32>), date: Option<DateTime<Utc>>) -> RawProviderEvent {
    RawProviderEvent {
        provider_home_name: teams.home.name,
        provider_away_name: teams.away.name,
        status_code: status.short,
        home_score: scores.0,
        away_score: scores.1,
        event_date: date,
        home_id: id_string(teams.home.id),
        away_id: id_string(teams.away.id),
        ..Default::default()
    }
}

/// Payload shape of a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Football,
    Basketball,
    Hockey,
    AmericanFootball,
    Mma,
}

impl Family {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "football" => Some(Family::Football),
            "basketball" => Some(Family::Basketball),
            "hockey" => Some(Family::Hockey),
            "american-football" => Some(Family::AmericanFootball),
            "mma" => Some(Family::Mma),
            _ => None,
        }
    }

    fn parse(&self, item: serde_json::Value) -> Result<RawProviderEvent, serde_json::Error> {
        Ok(match self {
            Family::Football => {
                let f: FootballFixture = serde_json::from_value(item)?;
                let date = parse_date(f.fixture.date.as_deref());
                team_event(f.teams, f.fixture.status, (f.goals.home, f.goals.away), date)
            }
            Family::Basketball => {
                let g: BasketballGame = serde_json::from_value(item)?;
                let date = parse_date(g.date.as_deref());
                team_event(g.teams, g.status, (g.scores.home.total, g.scores.away.total), date)
            }
            Family::Hockey => {
                let g: HockeyGame = serde_json::from_value(item)?;
                let date = parse_date(g.date.as_deref());
                team_event(g.teams, g.status, (g.scores.home, g.scores.away), date)
            }
            Family::AmericanFootball => {
                let g: AmericanFootballGame = serde_json::from_value(item)?;
                let date = g.game.date.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0));
                team_event(g.teams, g.game.status, (g.scores.home.total, g.scores.away.total), date)
            }
            // The date-scoped fight listing reports winner flags but no result
            // method, so `method` stays empty: a finished fight with neither
            // fighter flagged is the only draw signal.
            Family::Mma => {
                let f: MmaFight = serde_json::from_value(item)?;
                let first = f.fighters.first;
                let second = f.fighters.second;
                let winner_id = if first.winner == Some(true) {
                    id_string(first.id)
                } else if second.winner == Some(true) {
                    id_string(second.id)
                } else {
                    None
                };
                RawProviderEvent {
                    provider_home_name: first.name,
                    provider_away_name: second.name,
                    status_code: f.status.short,
                    event_date: parse_date(f.date.as_deref()),
                    home_id: id_string(first.id),
                    away_id: id_string(second.id),
                    winner_id,
                    ..Default::default()
                }
            }
        })
    }
}

// === Client ===

/// One API-Sports family bound to one sport domain.
pub struct ApiSportsClient {
    http: reqwest::Client,
    endpoint: ProviderEndpoint,
    family: Family,
    base_url: String,
    api_key: String,
    limiter: Arc<ProviderRateLimiter>,
}

impl ApiSportsClient {
    pub fn new(endpoint: ProviderEndpoint, api_key: String) -> Result<Self> {
        let base_url = endpoint.base_url;
        Self::new_with_base_url(endpoint, api_key, base_url)
    }

    /// Create a client with a custom base URL (for testing with mock servers).
    pub fn new_with_base_url(endpoint: ProviderEndpoint, api_key: String, base_url: &str) -> Result<Self> {
        let family = Family::from_name(endpoint.family)
            .with_context(|| format!("Unsupported provider family {}", endpoint.family))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .context("Failed to build provider HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            family,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            limiter: family_limiter(config::provider_requests_per_min()),
        })
    }

    pub fn with_limiter(mut self, limiter: Arc<ProviderRateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Query string for a date-scoped listing. A league is only sent when it
    /// maps to a known provider id, together with its season.
    fn query(&self, date: NaiveDate, league: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![("date", date.format("%Y-%m-%d").to_string())];

        let league = league
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .or(self.endpoint.default_league);
        if let Some(name) = league {
            match get_league_config(self.endpoint.domain, name)
                .or_else(|| self.endpoint.default_league.and_then(|d| get_league_config(self.endpoint.domain, d)))
            {
                Some(cfg) => {
                    params.push(("league", cfg.api_league_id.to_string()));
                    params.push(("season", cfg.season.season_for(date)));
                }
                None => debug!("[PROVIDER] {} has no id for league {:?}; listing all", self.endpoint.family, name),
            }
        }
        params
    }

    /// GET the listing with bounded retry on transport errors, 429 and 5xx.
    async fn get_listing(&self, params: &[(&'static str, String)]) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}{}", self.base_url, self.endpoint.path);
        let mut last_error = String::new();

        for attempt in 0..PROVIDER_MAX_ATTEMPTS {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms
                tokio::time::sleep(Duration::from_millis(100 * (1 << (attempt - 1)))).await;
            }
            self.limiter.until_ready().await;

            let resp = match self
                .http
                .get(&url)
                .header(API_SPORTS_AUTH_HEADER, &self.api_key)
                .query(params)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = format!("request error: {}", e);
                    continue;
                }
            };

            let status = resp.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_error = format!("HTTP {}", status);
                continue;
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("{} API error {}: {}", self.endpoint.family, status, body);
            }

            let envelope: Envelope = resp
                .json()
                .await
                .with_context(|| format!("{} returned a malformed listing", self.endpoint.family))?;
            if has_errors(&envelope.errors) {
                anyhow::bail!("{} API rejected request: {}", self.endpoint.family, envelope.errors);
            }
            return Ok(envelope.response);
        }

        anyhow::bail!(
            "{} lookup failed after {} attempts: {}",
            self.endpoint.family,
            PROVIDER_MAX_ATTEMPTS,
            last_error
        )
    }
}

#[async_trait]
impl EventProvider for ApiSportsClient {
    fn name(&self) -> &str {
        self.endpoint.family
    }

    async fn fetch(&self, date: NaiveDate, league: Option<&str>) -> Result<Vec<RawProviderEvent>> {
        let params = self.query(date, league);
        let items = self.get_listing(&params).await?;
        let total = items.len();

        let mut events = Vec::with_capacity(total);
        for item in items {
            match self.family.parse(item) {
                Ok(event) => events.push(event),
                Err(e) => debug!("[PROVIDER] {} skipped malformed event: {}", self.endpoint.family, e),
            }
        }
        debug!(
            "[PROVIDER] {} {} -> {}/{} events",
            self.endpoint.family, date, events.len(), total
        );
        Ok(events)
    }
}

/// One client per resolvable domain that has an API key. Domains sharing a
/// family share its rate limiter.
pub fn build_provider_set() -> Result<ProviderSet> {
    let mut set = ProviderSet::new();
    let mut limiters: HashMap<&'static str, Arc<ProviderRateLimiter>> = HashMap::new();

    for endpoint in config::provider_endpoints() {
        let domain: SportDomain = endpoint.domain;
        let Some(key) = config::api_sports_key(&endpoint) else {
            warn!(
                "[PROVIDER] No API key for {} ({} or API_SPORTS_KEY); {} forecasts will be skipped",
                endpoint.family, endpoint.key_env, domain
            );
            continue;
        };
        let limiter = limiters
            .entry(endpoint.family)
            .or_insert_with(|| family_limiter(config::provider_requests_per_min()))
            .clone();
        let client = ApiSportsClient::new(endpoint, key)?.with_limiter(limiter);
        set.insert(domain, Arc::new(client));
    }

    if set.is_empty() {
        warn!("[PROVIDER] No provider has an API key; every forecast will be skipped");
    } else {
        info!("[PROVIDER] Configured providers: {:?}", set.domains());
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(domain: SportDomain) -> ApiSportsClient {
        let endpoint = config::provider_endpoint(domain).unwrap();
        ApiSportsClient::new_with_base_url(endpoint, "k".into(), "http://localhost").unwrap()
    }

    #[test]
    fn test_query_adds_league_and_season_when_known() {
        let c = client(SportDomain::Soccer);
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let q = c.query(date, Some("EPL"));
        assert_eq!(q[0], ("date", "2025-03-01".to_string()));
        assert!(q.contains(&("league", "39".to_string())));
        assert!(q.contains(&("season", "2024".to_string())));

        let q = c.query(date, Some("Sunday League"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_euroleague_always_filters_by_league() {
        let c = client(SportDomain::Euroleague);
        let date = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        let q = c.query(date, None);
        assert!(q.contains(&("league", "120".to_string())));
        assert!(q.contains(&("season", "2024".to_string())));
    }

    #[test]
    fn test_errors_field_detection() {
        assert!(!has_errors(&json!([])));
        assert!(!has_errors(&json!({})));
        assert!(!has_errors(&serde_json::Value::Null));
        assert!(has_errors(&json!({"token": "Error/Missing application key."})));
        assert!(has_errors(&json!(["rate limit"])));
    }

    #[test]
    fn test_parse_football_fixture() {
        let item = json!({
            "fixture": {"id": 1, "date": "2025-03-01T15:00:00+00:00", "status": {"short": "FT"}},
            "teams": {"home": {"id": 49, "name": "Chelsea"}, "away": {"id": 40, "name": "Liverpool"}},
            "goals": {"home": 2, "away": 1}
        });
        let e = Family::Football.parse(item).unwrap();
        assert_eq!(e.provider_home_name, "Chelsea");
        assert_eq!(e.status_code, "FT");
        assert_eq!((e.home_score, e.away_score), (Some(2), Some(1)));
        assert_eq!(e.home_id.as_deref(), Some("49"));
        assert!(e.event_date.is_some());
    }

    #[test]
    fn test_parse_unplayed_games_have_no_score() {
        let item = json!({
            "date": "2025-03-01T00:30:00+00:00",
            "status": {"short": "NS"},
            "teams": {"home": {"id": 1, "name": "Boston Celtics"}, "away": {"id": 2, "name": "Miami Heat"}},
            "scores": {"home": {"total": null}, "away": {"total": null}}
        });
        let e = Family::Basketball.parse(item).unwrap();
        assert_eq!(e.home_score, None);
        assert_eq!(e.status_code, "NS");
    }

    #[test]
    fn test_parse_hockey_and_american_football() {
        let hockey = json!({
            "date": "2025-03-01T00:00:00+00:00",
            "status": {"short": "AOT"},
            "teams": {"home": {"id": 1, "name": "Boston Bruins"}, "away": {"id": 2, "name": "New York Rangers"}},
            "scores": {"home": 3, "away": 2}
        });
        let e = Family::Hockey.parse(hockey).unwrap();
        assert_eq!((e.home_score, e.away_score), (Some(3), Some(2)));

        let nfl = json!({
            "game": {"id": 9, "date": {"date": "2024-09-05", "timestamp": 1725582000}, "status": {"short": "FT"}},
            "teams": {"home": {"id": 1, "name": "Kansas City Chiefs"}, "away": {"id": 2, "name": "Baltimore Ravens"}},
            "scores": {"home": {"total": 27}, "away": {"total": 20}}
        });
        let e = Family::AmericanFootball.parse(nfl).unwrap();
        assert_eq!(e.provider_away_name, "Baltimore Ravens");
        assert_eq!((e.home_score, e.away_score), (Some(27), Some(20)));
        assert!(e.event_date.is_some());
    }

    #[test]
    fn test_parse_mma_fight_winner() {
        let item = json!({
            "date": "2024-11-16T03:00:00+00:00",
            "status": {"short": "FT"},
            "fighters": {
                "first": {"id": 101, "name": "Jon Jones", "winner": true},
                "second": {"id": 202, "name": "Stipe Miocic", "winner": false}
            }
        });
        let e = Family::Mma.parse(item).unwrap();
        assert_eq!(e.winner_id.as_deref(), Some("101"));
        assert_eq!(e.home_id.as_deref(), Some("101"));
        assert_eq!(e.home_score, None);
    }

    #[test]
    fn test_mma_fight_without_winner_settles_as_draw() {
        use matchday::{OutcomeResolver, TeamMatcher};

        let item = json!({
            "date": "2024-11-16T03:00:00+00:00",
            "status": {"short": "FT"},
            "fighters": {
                "first": {"id": 101, "name": "Jon Jones", "winner": false},
                "second": {"id": 202, "name": "Stipe Miocic", "winner": false}
            }
        });
        let e = Family::Mma.parse(item).unwrap();
        assert_eq!(e.winner_id, None);
        assert_eq!(e.method, None);

        let matcher = TeamMatcher::default();
        let resolved = OutcomeResolver::new(&matcher)
            .resolve(SportDomain::Mma, "Jon Jones", "Stipe Miocic", &e)
            .unwrap();
        assert_eq!((resolved.home_score, resolved.away_score), (0, 0));
    }
}
