//! Turning a provider event into a finished, oriented match result.

use tracing::debug;

use crate::teams::TeamMatcher;
use crate::types::{RawProviderEvent, ResolvedMatch, SportDomain};

const SOCCER_TERMINAL: &[&str] = &["FT"];
const BASKETBALL_TERMINAL: &[&str] = &["FT", "AOT", "AP"];
const HOCKEY_TERMINAL: &[&str] = &["FT", "AOT", "AP", "POST"];
const AMERICAN_FOOTBALL_TERMINAL: &[&str] = &["FT", "AOT"];
const MMA_TERMINAL: &[&str] = &["FT"];

/// Status codes that mean "finished" for a domain.
pub fn terminal_statuses(domain: SportDomain) -> &'static [&'static str] {
    match domain {
        SportDomain::Soccer => SOCCER_TERMINAL,
        SportDomain::Basketball | SportDomain::Euroleague => BASKETBALL_TERMINAL,
        SportDomain::Hockey => HOCKEY_TERMINAL,
        SportDomain::AmericanFootball => AMERICAN_FOOTBALL_TERMINAL,
        SportDomain::Mma => MMA_TERMINAL,
        SportDomain::Unknown => &[],
    }
}

pub fn is_terminal(domain: SportDomain, status_code: &str) -> bool {
    let status = status_code.trim();
    terminal_statuses(domain)
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status))
}

pub struct OutcomeResolver<'a> {
    matcher: &'a TeamMatcher,
}

impl<'a> OutcomeResolver<'a> {
    pub fn new(matcher: &'a TeamMatcher) -> Self {
        Self { matcher }
    }

    /// `None` when the event is not finished, does not pair up with the
    /// forecast teams, or carries no usable result.
    ///
    /// Team names and scores are reported in the provider's orientation;
    /// `orientation_swapped` records whether the forecast had them reversed.
    pub fn resolve(
        &self,
        domain: SportDomain,
        home: &str,
        away: &str,
        event: &RawProviderEvent,
    ) -> Option<ResolvedMatch> {
        if !is_terminal(domain, &event.status_code) {
            debug!(
                "[RESOLVE] {} vs {} not finished (status {})",
                event.provider_home_name, event.provider_away_name, event.status_code
            );
            return None;
        }

        let orientation_swapped = self.orientation(home, away, event)?;

        let (home_score, away_score) = if domain == SportDomain::Mma {
            mma_pseudo_score(event)?
        } else {
            (event.home_score?, event.away_score?)
        };

        Some(ResolvedMatch {
            actual_home_team: event.provider_home_name.clone(),
            actual_away_team: event.provider_away_name.clone(),
            home_score,
            away_score,
            orientation_swapped,
        })
    }

    /// `Some(false)` for the direct pairing, `Some(true)` for the swapped one.
    /// When both pair up, the one with higher similarity wins.
    fn orientation(&self, home: &str, away: &str, event: &RawProviderEvent) -> Option<bool> {
        let m = self.matcher;
        let ph = &event.provider_home_name;
        let pa = &event.provider_away_name;

        let direct = m.matches(ph, home) && m.matches(pa, away);
        let swapped = m.matches(ph, away) && m.matches(pa, home);

        match (direct, swapped) {
            (true, false) => Some(false),
            (false, true) => Some(true),
            (true, true) => {
                let direct_score = m.similarity(ph, home) + m.similarity(pa, away);
                let swapped_score = m.similarity(ph, away) + m.similarity(pa, home);
                Some(swapped_score > direct_score)
            }
            (false, false) => None,
        }
    }
}

/// MMA results carry a winner id instead of a score: winner 1, loser 0, and
/// 0-0 for a draw. A winner id matching neither fighter is unusable.
fn mma_pseudo_score(event: &RawProviderEvent) -> Option<(u32, u32)> {
    let is_draw = event
        .method
        .as_deref()
        .is_some_and(|m| m.to_lowercase().contains("draw"));

    match event.winner_id.as_deref().map(str::trim) {
        _ if is_draw => Some((0, 0)),
        None | Some("") => Some((0, 0)),
        Some(winner) => {
            if event.home_id.as_deref() == Some(winner) {
                Some((1, 0))
            } else if event.away_id.as_deref() == Some(winner) {
                Some((0, 1))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn fight(winner: Option<&str>, method: Option<&str>) -> RawProviderEvent {
        RawProviderEvent {
            provider_home_name: "Jon Jones".into(),
            provider_away_name: "Stipe Miocic".into(),
            status_code: "FT".into(),
            home_id: Some("101".into()),
            away_id: Some("202".into()),
            winner_id: winner.map(String::from),
            method: method.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_terminal_status_sets() {
        assert!(is_terminal(SportDomain::Soccer, "FT"));
        assert!(!is_terminal(SportDomain::Soccer, "AOT"));
        assert!(!is_terminal(SportDomain::Soccer, "2H"));
        assert!(is_terminal(SportDomain::Basketball, "AOT"));
        assert!(!is_terminal(SportDomain::Basketball, "POST"));
        assert!(is_terminal(SportDomain::Hockey, "post"));
        assert!(is_terminal(SportDomain::Euroleague, "AP"));
        assert!(is_terminal(SportDomain::Mma, "FT"));
        assert!(!is_terminal(SportDomain::Unknown, "FT"));
    }

    #[test]
    fn test_direct_orientation() {
        let matcher = TeamMatcher::default();
        let resolver = OutcomeResolver::new(&matcher);
        let event = RawProviderEvent::scored("Chelsea", "Liverpool", "FT", 3, 1);
        let resolved = resolver.resolve(SportDomain::Soccer, "Chelsea", "Liverpool", &event).unwrap();
        assert!(!resolved.orientation_swapped);
        assert_eq!((resolved.home_score, resolved.away_score), (3, 1));
        assert_eq!(resolved.winner(), Side::Home);
    }

    #[test]
    fn test_swap_detection_keeps_provider_orientation() {
        let matcher = TeamMatcher::default();
        let resolver = OutcomeResolver::new(&matcher);
        let event = RawProviderEvent::scored("Liverpool", "Chelsea", "FT", 0, 2);
        let resolved = resolver.resolve(SportDomain::Soccer, "Chelsea", "Liverpool", &event).unwrap();
        assert!(resolved.orientation_swapped);
        assert_eq!(resolved.actual_home_team, "Liverpool");
        assert_eq!(resolved.actual_away_team, "Chelsea");
        assert_eq!((resolved.home_score, resolved.away_score), (0, 2));
    }

    #[test]
    fn test_non_terminal_and_unscored_events() {
        let matcher = TeamMatcher::default();
        let resolver = OutcomeResolver::new(&matcher);
        let live = RawProviderEvent::scored("Chelsea", "Liverpool", "2H", 1, 0);
        assert!(resolver.resolve(SportDomain::Soccer, "Chelsea", "Liverpool", &live).is_none());

        let unscored = RawProviderEvent::unscored("Chelsea", "Liverpool", "FT");
        assert!(resolver.resolve(SportDomain::Soccer, "Chelsea", "Liverpool", &unscored).is_none());

        let other = RawProviderEvent::scored("Arsenal", "Everton", "FT", 1, 0);
        assert!(resolver.resolve(SportDomain::Soccer, "Chelsea", "Liverpool", &other).is_none());
    }

    #[test]
    fn test_hockey_post_only_for_hockey() {
        let matcher = TeamMatcher::default();
        let resolver = OutcomeResolver::new(&matcher);
        let event = RawProviderEvent::scored("Boston Bruins", "New York Rangers", "POST", 3, 2);
        assert!(resolver.resolve(SportDomain::Hockey, "Bruins", "Rangers", &event).is_some());
        assert!(resolver.resolve(SportDomain::Basketball, "Bruins", "Rangers", &event).is_none());
    }

    #[test]
    fn test_mma_pseudo_scores() {
        let matcher = TeamMatcher::default();
        let resolver = OutcomeResolver::new(&matcher);

        let home_win = resolver
            .resolve(SportDomain::Mma, "Jon Jones", "Stipe Miocic", &fight(Some("101"), Some("KO/TKO")))
            .unwrap();
        assert_eq!((home_win.home_score, home_win.away_score), (1, 0));

        let away_win = resolver
            .resolve(SportDomain::Mma, "Jon Jones", "Stipe Miocic", &fight(Some("202"), None))
            .unwrap();
        assert_eq!((away_win.home_score, away_win.away_score), (0, 1));

        let no_winner = resolver
            .resolve(SportDomain::Mma, "Jon Jones", "Stipe Miocic", &fight(None, None))
            .unwrap();
        assert_eq!((no_winner.home_score, no_winner.away_score), (0, 0));

        let draw = resolver
            .resolve(SportDomain::Mma, "Jon Jones", "Stipe Miocic", &fight(Some("101"), Some("Draw - Majority")))
            .unwrap();
        assert_eq!(draw.winner(), Side::Draw);

        assert!(resolver
            .resolve(SportDomain::Mma, "Jon Jones", "Stipe Miocic", &fight(Some("999"), None))
            .is_none());
    }

    #[test]
    fn test_mma_winner_follows_swapped_fighters() {
        let matcher = TeamMatcher::default();
        let resolver = OutcomeResolver::new(&matcher);
        // Forecast lists Miocic first; provider lists Jones as "home"
        let resolved = resolver
            .resolve(SportDomain::Mma, "Stipe Miocic", "Jon Jones", &fight(Some("101"), None))
            .unwrap();
        assert!(resolved.orientation_swapped);
        assert_eq!((resolved.home_score, resolved.away_score), (1, 0));
    }
}
