//! Provider endpoints, league mapping and environment configuration.
//!
//! Every tunable is read from the environment once and cached. `.env` is
//! loaded by `paths::load_dotenv()` before any of these are first called.

use chrono::{Datelike, NaiveDate};
use matchday::SportDomain;

use crate::paths;

/// Auth header shared by every API-Sports family
pub const API_SPORTS_AUTH_HEADER: &str = "x-apisports-key";

/// HTTP timeout for provider requests
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Attempts per provider request before giving up (transient failures only)
pub const PROVIDER_MAX_ATTEMPTS: u32 = 3;

/// Upstream provider family for one sport domain
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub domain: SportDomain,
    /// Family name used in logs and key lookup ("football", "basketball", ...)
    pub family: &'static str,
    pub base_url: &'static str,
    /// Date-scoped listing path
    pub path: &'static str,
    /// Per-family key variable, checked before `API_SPORTS_KEY`
    pub key_env: &'static str,
    /// League applied when the forecast names none (Euroleague rides on the
    /// basketball family and always needs its league id)
    pub default_league: Option<&'static str>,
}

/// All provider families, one per resolvable domain
pub fn provider_endpoints() -> Vec<ProviderEndpoint> {
    vec![
        ProviderEndpoint {
            domain: SportDomain::Soccer,
            family: "football",
            base_url: "https://v3.football.api-sports.io",
            path: "/fixtures",
            key_env: "API_SPORTS_FOOTBALL_KEY",
            default_league: None,
        },
        ProviderEndpoint {
            domain: SportDomain::Basketball,
            family: "basketball",
            base_url: "https://v1.basketball.api-sports.io",
            path: "/games",
            key_env: "API_SPORTS_BASKETBALL_KEY",
            default_league: None,
        },
        ProviderEndpoint {
            domain: SportDomain::Euroleague,
            family: "basketball",
            base_url: "https://v1.basketball.api-sports.io",
            path: "/games",
            key_env: "API_SPORTS_BASKETBALL_KEY",
            default_league: Some("euroleague"),
        },
        ProviderEndpoint {
            domain: SportDomain::Hockey,
            family: "hockey",
            base_url: "https://v1.hockey.api-sports.io",
            path: "/games",
            key_env: "API_SPORTS_HOCKEY_KEY",
            default_league: None,
        },
        ProviderEndpoint {
            domain: SportDomain::AmericanFootball,
            family: "american-football",
            base_url: "https://v1.american-football.api-sports.io",
            path: "/games",
            key_env: "API_SPORTS_AMERICAN_FOOTBALL_KEY",
            default_league: None,
        },
        ProviderEndpoint {
            domain: SportDomain::Mma,
            family: "mma",
            base_url: "https://v1.mma.api-sports.io",
            path: "/fights",
            key_env: "API_SPORTS_MMA_KEY",
            default_league: None,
        },
    ]
}

pub fn provider_endpoint(domain: SportDomain) -> Option<ProviderEndpoint> {
    provider_endpoints().into_iter().find(|e| e.domain == domain)
}

/// How a league labels its season in provider queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonStyle {
    /// "2025" for fixtures in 2025
    CalendarYear,
    /// "2024" for an Aug 2024 - May 2025 season
    StartYear,
    /// "2024-2025" for an Oct 2024 - Jun 2025 season
    YearRange,
}

/// First month of a split season
const SPLIT_SEASON_START_MONTH: u32 = 7;

impl SeasonStyle {
    pub fn season_for(&self, date: NaiveDate) -> String {
        let start_year = if date.month() >= SPLIT_SEASON_START_MONTH {
            date.year()
        } else {
            date.year() - 1
        };
        match self {
            SeasonStyle::CalendarYear => date.year().to_string(),
            SeasonStyle::StartYear => start_year.to_string(),
            SeasonStyle::YearRange => format!("{}-{}", start_year, start_year + 1),
        }
    }
}

/// League configuration for provider lookups
#[derive(Debug, Clone)]
pub struct LeagueConfig {
    pub league_code: &'static str,
    /// Other spellings seen in forecast `league` fields
    pub names: &'static [&'static str],
    pub domain: SportDomain,
    pub api_league_id: u32,
    pub season: SeasonStyle,
}

/// Get all leagues with a known provider id
pub fn get_league_configs() -> Vec<LeagueConfig> {
    vec![
        // Soccer (API-Football)
        LeagueConfig { league_code: "epl", names: &["premier league", "english premier league"], domain: SportDomain::Soccer, api_league_id: 39, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "eflc", names: &["championship", "efl championship"], domain: SportDomain::Soccer, api_league_id: 40, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "laliga", names: &["la liga", "la_liga"], domain: SportDomain::Soccer, api_league_id: 140, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "bundesliga", names: &["1 bundesliga"], domain: SportDomain::Soccer, api_league_id: 78, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "seriea", names: &["serie a", "serie_a"], domain: SportDomain::Soccer, api_league_id: 135, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "ligue1", names: &["ligue 1", "ligue_1"], domain: SportDomain::Soccer, api_league_id: 61, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "eredivisie", names: &[], domain: SportDomain::Soccer, api_league_id: 88, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "primeira", names: &["primeira liga", "liga portugal"], domain: SportDomain::Soccer, api_league_id: 94, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "ucl", names: &["champions league", "uefa champions league"], domain: SportDomain::Soccer, api_league_id: 2, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "uel", names: &["europa league", "uefa europa league"], domain: SportDomain::Soccer, api_league_id: 3, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "mls", names: &["major league soccer"], domain: SportDomain::Soccer, api_league_id: 253, season: SeasonStyle::CalendarYear },
        // Basketball (API-Basketball)
        LeagueConfig { league_code: "nba", names: &[], domain: SportDomain::Basketball, api_league_id: 12, season: SeasonStyle::YearRange },
        LeagueConfig { league_code: "euroleague", names: &["euro league"], domain: SportDomain::Euroleague, api_league_id: 120, season: SeasonStyle::StartYear },
        // Hockey (API-Hockey)
        LeagueConfig { league_code: "nhl", names: &[], domain: SportDomain::Hockey, api_league_id: 57, season: SeasonStyle::StartYear },
        // American football (API-American-Football)
        LeagueConfig { league_code: "nfl", names: &[], domain: SportDomain::AmericanFootball, api_league_id: 1, season: SeasonStyle::StartYear },
        LeagueConfig { league_code: "ncaaf", names: &["ncaa football", "college football"], domain: SportDomain::AmericanFootball, api_league_id: 2, season: SeasonStyle::StartYear },
    ]
}

/// Get config for a league code or name within a domain
pub fn get_league_config(domain: SportDomain, league: &str) -> Option<LeagueConfig> {
    let needle = league.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    get_league_configs().into_iter().find(|c| {
        c.domain == domain && (c.league_code == needle || c.names.iter().any(|n| *n == needle))
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_path(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// SQLite forecast store. Set `FORECAST_DB_PATH` (default: `forecasts.db` in
/// the workspace root).
pub fn forecast_db_path() -> &'static str {
    static CACHED: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    CACHED.get_or_init(|| {
        env_path("FORECAST_DB_PATH").unwrap_or_else(|| {
            paths::default_db_path().to_string_lossy().into_owned()
        })
    })
}

/// Pause between forecasts in a pass, in milliseconds (default: 100)
pub fn resolution_delay_ms() -> u64 {
    static CACHED: std::sync::OnceLock<u64> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| env_parse("RESOLUTION_DELAY_MS").unwrap_or(100))
}

/// Minutes between passes in loop mode (default: 30)
pub fn resolution_interval_mins() -> u64 {
    static CACHED: std::sync::OnceLock<u64> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| env_parse("RESOLUTION_INTERVAL_MINS").unwrap_or(30))
}

/// Lifetime of a per-forecast claim, in seconds (default: 600)
pub fn lease_ttl_secs() -> i64 {
    static CACHED: std::sync::OnceLock<i64> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| env_parse("LEASE_TTL_SECS").filter(|v: &i64| *v > 0).unwrap_or(600))
}

/// Unproductive attempts before a forecast goes to manual review (default: 48)
pub fn max_resolution_attempts() -> u32 {
    static CACHED: std::sync::OnceLock<u32> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| env_parse("MAX_RESOLUTION_ATTEMPTS").unwrap_or(48))
}

/// Days past kickoff before a forecast goes to manual review (default: 7)
pub fn max_days_past_kickoff() -> i64 {
    static CACHED: std::sync::OnceLock<i64> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| env_parse("MAX_DAYS_PAST_KICKOFF").unwrap_or(7))
}

/// Minimum mean team similarity for a candidate event (default: 0.5)
pub fn min_pair_score() -> f64 {
    static CACHED: std::sync::OnceLock<f64> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| {
        env_parse("MIN_PAIR_SCORE")
            .filter(|v: &f64| (0.0..=1.0).contains(v))
            .unwrap_or(matchday::window::MIN_PAIR_SCORE)
    })
}

/// Provider request budget per minute, per family (default: 30)
pub fn provider_requests_per_min() -> u32 {
    static CACHED: std::sync::OnceLock<u32> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| {
        env_parse("API_SPORTS_REQUESTS_PER_MIN")
            .filter(|v: &u32| *v > 0)
            .unwrap_or(30)
    })
}

/// Alias file: `TEAM_ALIASES_PATH`, else the first `team_aliases.json` found
/// by [`paths::find_existing`].
pub fn team_aliases_path() -> Option<std::path::PathBuf> {
    data_file("TEAM_ALIASES_PATH", "team_aliases.json")
}

/// Vocabulary file: `SPORT_VOCAB_PATH`, else the first `sport_vocab.json`
/// found.
pub fn sport_vocab_path() -> Option<std::path::PathBuf> {
    data_file("SPORT_VOCAB_PATH", "sport_vocab.json")
}

fn data_file(key: &str, default_name: &str) -> Option<std::path::PathBuf> {
    if let Some(p) = env_path(key) {
        return Some(paths::resolve_user_path(p));
    }
    paths::find_existing(default_name)
}

/// API key for a provider family: the family's own variable, else
/// `API_SPORTS_KEY`.
pub fn api_sports_key(endpoint: &ProviderEndpoint) -> Option<String> {
    env_path(endpoint.key_env).or_else(|| env_path("API_SPORTS_KEY"))
}
