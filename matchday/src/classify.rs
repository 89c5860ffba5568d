//! Sport-domain classification for forecasts with missing or vague tags.

use crate::teams::{contains_phrase, fold_name};
use crate::types::{Forecast, SportDomain};
use crate::vocab::SportVocabulary;

/// Routes a forecast to a provider family.
///
/// An explicit soccer tag wins outright so that coincidental keywords in team
/// names ("Jets", "Kings") cannot pull a soccer fixture into another family.
/// Everything else falls through to keyword groups in vocabulary order.
#[derive(Debug, Clone, Default)]
pub struct SportClassifier {
    vocab: SportVocabulary,
}

impl SportClassifier {
    pub fn new(vocab: SportVocabulary) -> Self {
        Self { vocab }
    }

    pub fn classify(&self, forecast: &Forecast) -> SportDomain {
        self.classify_parts(&forecast.sport_tag, &forecast.league, &forecast.match_label)
    }

    pub fn classify_parts(&self, sport_tag: &str, league: &str, match_label: &str) -> SportDomain {
        let tag = sport_tag.trim().to_lowercase();

        if !tag.is_empty() {
            if self.vocab.soccer_tags.iter().any(|t| !t.is_empty() && tag.contains(t.as_str())) {
                return SportDomain::Soccer;
            }
            for group in &self.vocab.explicit_tags {
                if group.keywords.iter().any(|t| !t.is_empty() && tag.contains(t.as_str())) {
                    return group.domain;
                }
            }
        }

        let text = fold_name(&format!("{} {}", match_label, league));
        for group in &self.vocab.team_keywords {
            if group.keywords.iter().any(|kw| contains_phrase(&text, kw)) {
                return group.domain;
            }
        }

        SportDomain::Unknown
    }
}
