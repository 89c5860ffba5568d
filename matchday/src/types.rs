//! Shared data model for forecasts, provider events and resolved matches.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Sport/league family a forecast is routed to. Each resolvable family maps
/// to exactly one upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportDomain {
    Soccer,
    Basketball,
    Hockey,
    AmericanFootball,
    Euroleague,
    Mma,
    Unknown,
}

impl SportDomain {
    /// Every domain that has a provider family behind it.
    pub const RESOLVABLE: [SportDomain; 6] = [
        SportDomain::Soccer,
        SportDomain::Basketball,
        SportDomain::Hockey,
        SportDomain::AmericanFootball,
        SportDomain::Euroleague,
        SportDomain::Mma,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SportDomain::Soccer => "soccer",
            SportDomain::Basketball => "basketball",
            SportDomain::Hockey => "hockey",
            SportDomain::AmericanFootball => "american_football",
            SportDomain::Euroleague => "euroleague",
            SportDomain::Mma => "mma",
            SportDomain::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SportDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One side of a fixture, or the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Home,
    Away,
    Draw,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "HOME",
            Side::Away => "AWAY",
            Side::Draw => "DRAW",
        }
    }

    /// Human-readable result label ("Home Win", "Away Win", "Draw").
    pub fn result_label(&self) -> &'static str {
        match self {
            Side::Home => "Home Win",
            Side::Away => "Away Win",
            Side::Draw => "Draw",
        }
    }

    /// The same team seen from the reversed home/away orientation.
    pub fn flipped(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
            Side::Draw => Side::Draw,
        }
    }

    /// Flip only when `swapped` is set.
    pub fn reoriented(self, swapped: bool) -> Self {
        if swapped { self.flipped() } else { self }
    }

    /// Parse "home"/"away"/"draw" in any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Some(Side::Home),
            "away" => Some(Side::Away),
            "draw" => Some(Side::Draw),
            _ => None,
        }
    }

    /// Winner from a home/away score pair.
    pub fn from_scores(home: u32, away: u32) -> Self {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Side::Home,
            std::cmp::Ordering::Less => Side::Away,
            std::cmp::Ordering::Equal => Side::Draw,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a forecast. `Hit` and `Miss` are terminal; `NeedsManualReview`
/// can only be left through the manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForecastState {
    #[default]
    Pending,
    Hit,
    Miss,
    NeedsManualReview,
}

impl ForecastState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastState::Pending => "PENDING",
            ForecastState::Hit => "HIT",
            ForecastState::Miss => "MISS",
            ForecastState::NeedsManualReview => "NEEDS_MANUAL_REVIEW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ForecastState::Pending),
            "HIT" => Some(ForecastState::Hit),
            "MISS" => Some(ForecastState::Miss),
            "NEEDS_MANUAL_REVIEW" => Some(ForecastState::NeedsManualReview),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, ForecastState::Hit | ForecastState::Miss)
    }
}

impl std::fmt::Display for ForecastState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binary settlement outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Hit,
    Miss,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "HIT",
            Outcome::Miss => "MISS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIT" => Some(Outcome::Hit),
            "MISS" => Some(Outcome::Miss),
            _ => None,
        }
    }

    pub fn state(&self) -> ForecastState {
        match self {
            Outcome::Hit => ForecastState::Hit,
            Outcome::Miss => ForecastState::Miss,
        }
    }
}

impl From<bool> for Outcome {
    fn from(won: bool) -> Self {
        if won { Outcome::Hit } else { Outcome::Miss }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded prediction about a fixture, awaiting settlement.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Forecast {
    pub id: String,
    /// Conventionally "<home> vs <away>"
    pub match_label: String,
    #[serde(default)]
    pub sport_tag: String,
    #[serde(default)]
    pub league: String,
    pub kickoff: DateTime<Utc>,
    pub forecast_text: String,
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub value_bet_side: Option<Side>,
    #[serde(default)]
    pub value_bet_odds: Option<f64>,
    #[serde(default)]
    pub state: ForecastState,
    #[serde(default)]
    pub actual_result: Option<String>,
    #[serde(default)]
    pub actual_score: Option<String>,
    #[serde(default)]
    pub value_bet_outcome: Option<Outcome>,
    #[serde(default)]
    pub value_bet_profit: Option<f64>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Forecast {
    /// Home/away team names as recorded in `match_label`.
    pub fn recorded_teams(&self) -> Option<(String, String)> {
        split_match_label(&self.match_label)
    }

    pub fn recorded_home_team(&self) -> Option<String> {
        self.recorded_teams().map(|(home, _)| home)
    }

    pub fn recorded_away_team(&self) -> Option<String> {
        self.recorded_teams().map(|(_, away)| away)
    }
}

static RE_LABEL_VS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(.+?)\s+(?:vs\.?|v\.?|versus)\s+(.+?)\s*$").unwrap()
});
static RE_LABEL_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s+@\s+(.+?)\s*$").unwrap()
});
static RE_LABEL_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s+[-–]\s+(.+?)\s*$").unwrap()
});

/// Split a match label into (home, away).
/// "Chelsea vs Liverpool" -> ("Chelsea", "Liverpool")
/// "Jets @ Dolphins" -> ("Dolphins", "Jets")  (US "away @ home" convention)
pub fn split_match_label(label: &str) -> Option<(String, String)> {
    fn pair(caps: &regex::Captures) -> Option<(String, String)> {
        let a = caps.get(1)?.as_str().trim();
        let b = caps.get(2)?.as_str().trim();
        if a.is_empty() || b.is_empty() {
            return None;
        }
        Some((a.to_string(), b.to_string()))
    }

    if let Some(caps) = RE_LABEL_VS.captures(label) {
        return pair(&caps);
    }
    if let Some(caps) = RE_LABEL_AT.captures(label) {
        return pair(&caps).map(|(away, home)| (home, away));
    }
    if let Some(caps) = RE_LABEL_DASH.captures(label) {
        return pair(&caps);
    }
    None
}

/// One event as returned by a provider, before any interpretation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RawProviderEvent {
    pub provider_home_name: String,
    pub provider_away_name: String,
    pub status_code: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub event_date: Option<DateTime<Utc>>,
    /// Competitor ids, used by providers that report a winner id instead of a score
    #[serde(default)]
    pub home_id: Option<String>,
    #[serde(default)]
    pub away_id: Option<String>,
    #[serde(default)]
    pub winner_id: Option<String>,
    /// Free-text result method ("KO/TKO", "Decision - Split", "Draw", ...),
    /// for providers that report one
    #[serde(default)]
    pub method: Option<String>,
}

impl RawProviderEvent {
    /// Event with a numeric final score.
    pub fn scored(home: &str, away: &str, status: &str, home_score: u32, away_score: u32) -> Self {
        Self {
            provider_home_name: home.to_string(),
            provider_away_name: away.to_string(),
            status_code: status.to_string(),
            home_score: Some(home_score),
            away_score: Some(away_score),
            ..Default::default()
        }
    }

    /// Event that has not produced a score yet.
    pub fn unscored(home: &str, away: &str, status: &str) -> Self {
        Self {
            provider_home_name: home.to_string(),
            provider_away_name: away.to_string(),
            status_code: status.to_string(),
            ..Default::default()
        }
    }
}

/// A finished fixture matched to a forecast. Team names and scores are always
/// in the provider's orientation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedMatch {
    pub actual_home_team: String,
    pub actual_away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    /// The forecast recorded home/away the other way round
    pub orientation_swapped: bool,
}

impl ResolvedMatch {
    /// Winner in the provider's orientation.
    pub fn winner(&self) -> Side {
        Side::from_scores(self.home_score, self.away_score)
    }
}
