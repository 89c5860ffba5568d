//! Settlement of a forecast against a resolved match.
//!
//! Pure computation. Every comparison is made in the forecast's own
//! home/away orientation: when the provider listed the teams the other way
//! round, the winner is flipped before it is compared with the predicted side
//! or the value-bet side, so both are effectively keyed by team identity.

use serde::{Deserialize, Serialize};

use crate::teams::{contains_phrase, fold_name, strip_club_tokens, TeamMatcher};
use crate::types::{Forecast, Outcome, ResolvedMatch, Side};

/// Tokens shorter than this never identify a team in free text
const MIN_TEAM_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub outcome: Outcome,
    /// "Home Win" / "Away Win" / "Draw" in the forecast's orientation
    pub actual_result: String,
    /// "<home>-<away>" in the forecast's orientation
    pub actual_score: String,
    pub actual_winner: Side,
    /// What the forecast was read as predicting, if anything
    pub predicted_side: Option<Side>,
    pub value_bet_outcome: Option<Outcome>,
    pub value_bet_profit: Option<f64>,
}

pub struct SettlementEngine<'a> {
    matcher: &'a TeamMatcher,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(matcher: &'a TeamMatcher) -> Self {
        Self { matcher }
    }

    pub fn settle(&self, forecast: &Forecast, resolved: &ResolvedMatch) -> SettlementResult {
        let winner = resolved.winner().reoriented(resolved.orientation_swapped);
        let (home_score, away_score) = if resolved.orientation_swapped {
            (resolved.away_score, resolved.home_score)
        } else {
            (resolved.home_score, resolved.away_score)
        };

        let predicted_side = self.predicted_side(forecast);
        // A forecast we cannot read is settled as a miss, not left pending
        let outcome = Outcome::from(predicted_side == Some(winner));

        let value_bet = match (forecast.value_bet_side, forecast.value_bet_odds) {
            (Some(side), Some(odds)) => settle_value_bet(side, odds, winner),
            _ => None,
        };

        SettlementResult {
            outcome,
            actual_result: winner.result_label().to_string(),
            actual_score: format!("{}-{}", home_score, away_score),
            actual_winner: winner,
            predicted_side,
            value_bet_outcome: value_bet.map(|(o, _)| o),
            value_bet_profit: value_bet.map(|(_, p)| p),
        }
    }

    /// Side the forecast predicts, in its own orientation.
    ///
    /// Explicit side phrases ("home win", "away victory", a bare "draw") are
    /// read first, in `selection` and then in the free text. Only then does a
    /// `selection` naming one of the teams count, and as a last resort the free
    /// text is searched for the final name token of either recorded team.
    pub fn predicted_side(&self, forecast: &Forecast) -> Option<Side> {
        let selection = forecast.selection.as_deref().unwrap_or("");
        if let Some(side) = phrase_side(selection).or_else(|| phrase_side(&forecast.forecast_text)) {
            return Some(side);
        }

        let (home, away) = forecast.recorded_teams()?;
        if !selection.trim().is_empty() {
            if let Some(side) = self.named_side(selection, &home, &away) {
                return Some(side);
            }
        }
        team_token_side(&forecast.forecast_text, &home, &away)
    }

    fn named_side(&self, selection: &str, home: &str, away: &str) -> Option<Side> {
        match (self.matcher.matches(selection, home), self.matcher.matches(selection, away)) {
            (true, false) => Some(Side::Home),
            (false, true) => Some(Side::Away),
            _ => None,
        }
    }
}

/// Unit-stake value bet: profit `odds - 1` on a win, `-1` otherwise.
/// Odds below 1.0 or non-finite are ignored.
pub fn settle_value_bet(side: Side, odds: f64, winner: Side) -> Option<(Outcome, f64)> {
    if !odds.is_finite() || odds < 1.0 {
        return None;
    }
    let won = side == winner;
    let profit = if won { odds - 1.0 } else { -1.0 };
    Some((Outcome::from(won), profit))
}

const HOME_PHRASES: &[&str] = &["home win", "home victory", "home team to win"];
const AWAY_PHRASES: &[&str] = &["away win", "away victory", "away team to win"];
const DRAW_PHRASES: &[&str] = &["a draw", "score draw", "ends level", "ends in a tie"];

/// Side named by an explicit phrase, or by a text that is nothing but
/// "home", "away" or "draw".
fn phrase_side(text: &str) -> Option<Side> {
    let folded = fold_name(text);
    if folded.is_empty() {
        return None;
    }
    if let Some(side) = Side::parse(&folded) {
        return Some(side);
    }

    let any = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&folded, p));
    // "draw no bet" backs a team, not the draw
    let draw = any(DRAW_PHRASES) && !contains_phrase(&folded, "draw no bet");
    match (any(HOME_PHRASES), any(AWAY_PHRASES), draw) {
        (true, false, false) => Some(Side::Home),
        (false, true, false) => Some(Side::Away),
        (false, false, true) => Some(Side::Draw),
        _ => None,
    }
}

/// Earliest whole-word occurrence of either team's last name token.
fn team_token_side(text: &str, home: &str, away: &str) -> Option<Side> {
    let folded = fold_name(text);
    let words: Vec<&str> = folded.split(' ').collect();
    let position = |token: &str| words.iter().position(|w| *w == token);

    let home_token = last_token(home);
    let away_token = last_token(away).filter(|t| Some(t) != home_token.as_ref());

    let home_pos = home_token.as_deref().and_then(position);
    let away_pos = away_token.as_deref().and_then(position);

    match (home_pos, away_pos) {
        (Some(h), Some(a)) => Some(if h <= a { Side::Home } else { Side::Away }),
        (Some(_), None) => Some(Side::Home),
        (None, Some(_)) => Some(Side::Away),
        (None, None) => None,
    }
}

/// Last token of a team name once club-form tokens are stripped; too-short
/// tokens ("sg", "fc") identify nothing.
fn last_token(team: &str) -> Option<String> {
    strip_club_tokens(&fold_name(team))
        .split(' ')
        .last()
        .filter(|t| t.chars().count() >= MIN_TEAM_TOKEN_LEN)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(label: &str, text: &str) -> Forecast {
        Forecast {
            id: "f-1".into(),
            match_label: label.into(),
            forecast_text: text.into(),
            ..Default::default()
        }
    }

    fn resolved(home: &str, away: &str, hs: u32, aws: u32, swapped: bool) -> ResolvedMatch {
        ResolvedMatch {
            actual_home_team: home.into(),
            actual_away_team: away.into(),
            home_score: hs,
            away_score: aws,
            orientation_swapped: swapped,
        }
    }

    #[test]
    fn test_home_win_hit() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Chelsea vs Liverpool", "Home Win");
        let r = engine.settle(&f, &resolved("Chelsea", "Liverpool", 3, 1, false));
        assert_eq!(r.outcome, Outcome::Hit);
        assert_eq!(r.actual_result, "Home Win");
        assert_eq!(r.actual_score, "3-1");
    }

    #[test]
    fn test_draw_miss() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Chelsea vs Liverpool", "Draw");
        let r = engine.settle(&f, &resolved("Chelsea", "Liverpool", 2, 1, false));
        assert_eq!(r.outcome, Outcome::Miss);
        assert_eq!(r.actual_result, "Home Win");
    }

    #[test]
    fn test_draw_no_bet_is_not_a_draw_prediction() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Chelsea vs Liverpool", "Liverpool draw no bet");
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));
    }

    #[test]
    fn test_value_bet_math() {
        assert_eq!(settle_value_bet(Side::Away, 2.50, Side::Away), Some((Outcome::Hit, 1.5)));
        assert_eq!(settle_value_bet(Side::Away, 2.50, Side::Home), Some((Outcome::Miss, -1.0)));
        let (outcome, profit) = settle_value_bet(Side::Draw, 3.333, Side::Draw).unwrap();
        assert_eq!(outcome, Outcome::Hit);
        assert!((profit - 2.333).abs() < 1e-9);
        let (_, profit) = settle_value_bet(Side::Home, 1.833, Side::Home).unwrap();
        assert!((profit - 0.833).abs() < 1e-9);
        assert_eq!(settle_value_bet(Side::Home, 0.5, Side::Home), None);
        assert_eq!(settle_value_bet(Side::Home, f64::NAN, Side::Home), None);
    }

    #[test]
    fn test_value_bet_is_independent_of_primary_outcome() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let mut f = forecast("Chelsea vs Liverpool", "Home Win");
        f.value_bet_side = Some(Side::Away);
        f.value_bet_odds = Some(2.5);
        let r = engine.settle(&f, &resolved("Chelsea", "Liverpool", 0, 1, false));
        assert_eq!(r.outcome, Outcome::Miss);
        assert_eq!(r.value_bet_outcome, Some(Outcome::Hit));
        assert_eq!(r.value_bet_profit, Some(1.5));

        let no_odds = forecast("Chelsea vs Liverpool", "Home Win");
        let r = engine.settle(&no_odds, &resolved("Chelsea", "Liverpool", 0, 1, false));
        assert_eq!(r.value_bet_outcome, None);
        assert_eq!(r.value_bet_profit, None);
    }

    #[test]
    fn test_swapped_orientation_is_keyed_by_team() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        // Forecast recorded Chelsea at home; provider lists Liverpool at home, 0-2
        let mut f = forecast("Chelsea vs Liverpool", "Home Win");
        f.value_bet_side = Some(Side::Home);
        f.value_bet_odds = Some(1.8);
        let r = engine.settle(&f, &resolved("Liverpool", "Chelsea", 0, 2, true));
        assert_eq!(r.actual_winner, Side::Home);
        assert_eq!(r.outcome, Outcome::Hit);
        assert_eq!(r.actual_result, "Home Win");
        assert_eq!(r.actual_score, "2-0");
        assert_eq!(r.value_bet_outcome, Some(Outcome::Hit));
        assert!((r.value_bet_profit.unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_selection_phrases_then_team_names() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let mut f = forecast("Wolves vs Chelsea", "Expect a tight game");
        f.selection = Some("Wolverhampton Wanderers".into());
        assert_eq!(engine.predicted_side(&f), Some(Side::Home));

        f.selection = Some("Away".into());
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));

        f.forecast_text = "Expect a tight game ending in a draw".into();
        f.selection = Some("Over 2.5".into());
        assert_eq!(engine.predicted_side(&f), Some(Side::Draw));
    }

    #[test]
    fn test_text_phrase_beats_team_named_in_selection() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let mut f = forecast("Wolves vs Chelsea", "Away win");
        f.selection = Some("Wolverhampton Wanderers".into());
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));
    }

    #[test]
    fn test_side_words_inside_sentences_are_not_phrases() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Chelsea vs Liverpool", "Liverpool to win away from home");
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));

        let f = forecast("Chelsea vs Liverpool", "Liverpool win, no draw here");
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));

        let f = forecast("Chelsea vs Liverpool", " draw ");
        assert_eq!(engine.predicted_side(&f), Some(Side::Draw));
    }

    #[test]
    fn test_short_home_token_still_reads_away_team() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Paris SG vs Arsenal", "Arsenal to edge it");
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));

        let f = forecast("Chelsea FC vs Arsenal", "Arsenal to edge it");
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));
        let r = engine.settle(&f, &resolved("Chelsea", "Arsenal", 0, 2, false));
        assert_eq!(r.outcome, Outcome::Hit);

        let f = forecast("Chelsea FC vs Arsenal", "Chelsea at the Bridge");
        assert_eq!(engine.predicted_side(&f), Some(Side::Home));
    }

    #[test]
    fn test_team_token_fallback() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Manchester City vs Arsenal", "Arsenal to edge it against City");
        assert_eq!(engine.predicted_side(&f), Some(Side::Away));

        let f = forecast("Manchester City vs Arsenal", "City should cruise");
        assert_eq!(engine.predicted_side(&f), Some(Side::Home));

        let r = engine.settle(&f, &resolved("Manchester City", "Arsenal", 1, 1, false));
        assert_eq!(r.outcome, Outcome::Miss);
        assert_eq!(r.actual_result, "Draw");
    }

    #[test]
    fn test_unreadable_forecast_is_miss() {
        let matcher = TeamMatcher::default();
        let engine = SettlementEngine::new(&matcher);
        let f = forecast("Chelsea vs Liverpool", "Over 2.5 goals");
        assert_eq!(engine.predicted_side(&f), None);
        let r = engine.settle(&f, &resolved("Chelsea", "Liverpool", 3, 1, false));
        assert_eq!(r.outcome, Outcome::Miss);

        let unlabeled = forecast("Chelsea", "Chelsea to win");
        assert_eq!(engine.predicted_side(&unlabeled), None);
    }
}
