//! Team-name normalization and fuzzy comparison.
//!
//! Providers spell the same club differently ("Wolverhampton Wanderers" vs
//! "Wolves", "Atlético Madrid" vs "Atletico de Madrid"). Names are folded to a
//! plain lowercase form, stripped of club-form tokens and then run through the
//! alias table so that known variants collapse onto one canonical name.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::vocab::AliasTable;

/// Tokens that only mark the club form ("FC Porto", "Chelsea F.C.")
const CLUB_FORM_TOKENS: &[&str] = &["fc", "cf", "afc", "sc"];

/// Tokens must be longer than 3 chars to take part in token-level matching
const MIN_TOKEN_LEN: usize = 4;

/// Credit given to a token that contains (or is contained by) the other
const PARTIAL_TOKEN_CREDIT: f64 = 0.75;

/// Lowercase, strip diacritics, drop `.` and `'`, turn other punctuation into
/// spaces and collapse whitespace. No alias substitution.
/// "Atlético  Madrid" -> "atletico madrid", "St. Louis Blues" -> "st louis blues"
pub fn fold_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    for c in lower.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            '.' | '\'' | '\u{2019}' => {}
            'ø' => out.push('o'),
            'ł' => out.push('l'),
            'đ' => out.push('d'),
            'ı' => out.push('i'),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            c if c.is_alphanumeric() => out.push(c),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove club-form tokens from either end of an already folded name, keeping
/// at least one token. "afc bournemouth" -> "bournemouth", "fc" -> "fc"
pub fn strip_club_tokens(folded: &str) -> String {
    let mut tokens: Vec<&str> = folded.split_whitespace().collect();
    while tokens.len() > 1 && CLUB_FORM_TOKENS.contains(&tokens[0]) {
        tokens.remove(0);
    }
    while tokens.len() > 1 && tokens.last().is_some_and(|t| CLUB_FORM_TOKENS.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Whole-word phrase containment over folded, space-separated text.
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    let text_words: Vec<&str> = text.split_whitespace().collect();
    let phrase_words: Vec<&str> = phrase.split_whitespace().collect();
    if phrase_words.is_empty() || phrase_words.len() > text_words.len() {
        return false;
    }
    text_words
        .windows(phrase_words.len())
        .any(|window| window == phrase_words.as_slice())
}

fn is_long_token(token: &str) -> bool {
    token.chars().count() >= MIN_TOKEN_LEN
}

/// Normalizes and compares team names using an injected alias table.
#[derive(Debug, Clone)]
pub struct TeamMatcher {
    aliases: AliasTable,
}

impl Default for TeamMatcher {
    fn default() -> Self {
        Self::new(AliasTable::builtin())
    }
}

impl TeamMatcher {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    /// Canonical form of a team name. Idempotent.
    pub fn normalize(&self, name: &str) -> String {
        let base = strip_club_tokens(&fold_name(name));
        match self.aliases.canonical(&base) {
            Some(canonical) => canonical.to_string(),
            None => base,
        }
    }

    /// Boolean fuzzy predicate: containment of the whole names, a shared long
    /// token (equal or one containing the other), or an equal long final token.
    pub fn matches(&self, provider_name: &str, search_name: &str) -> bool {
        let a = self.normalize(provider_name);
        let b = self.normalize(search_name);
        names_match(&a, &b)
    }

    /// Token-overlap score in `[0, 1]` between two names; 1.0 when they
    /// normalize to the same canonical name.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        token_overlap(&self.normalize(a), &self.normalize(b))
    }
}

fn names_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }

    // Nickname: "Manchester United" / "Newcastle United" style last tokens
    if let (Some(last_a), Some(last_b)) = (a.split(' ').last(), b.split(' ').last()) {
        if last_a == last_b && is_long_token(last_a) {
            return true;
        }
    }

    let long_b: Vec<&str> = b.split(' ').filter(|t| is_long_token(t)).collect();
    a.split(' ').filter(|t| is_long_token(t)).any(|x| {
        long_b
            .iter()
            .any(|y| x == *y || x.contains(y) || y.contains(x))
    })
}

/// Dice coefficient over tokens, with partial credit for long tokens that
/// contain one another. Each token on the right is used at most once.
fn token_overlap(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let ta: Vec<&str> = a.split(' ').collect();
    let tb: Vec<&str> = b.split(' ').collect();
    let mut used = vec![false; tb.len()];
    let mut credit = 0.0;

    for x in &ta {
        let mut best = 0.0;
        let mut best_idx = None;
        for (i, y) in tb.iter().enumerate() {
            if used[i] {
                continue;
            }
            let c = if x == y {
                1.0
            } else if is_long_token(x) && is_long_token(y) && (x.contains(y) || y.contains(x)) {
                PARTIAL_TOKEN_CREDIT
            } else {
                0.0
            };
            if c > best {
                best = c;
                best_idx = Some(i);
            }
        }
        if let Some(i) = best_idx {
            used[i] = true;
            credit += best;
        }
    }

    2.0 * credit / (ta.len() + tb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_NAMES: &[&str] = &[
        "Wolverhampton Wanderers",
        "Wolves",
        "Atlético Madrid",
        "  FC   Bayern München ",
        "AFC Bournemouth",
        "Paris Saint-Germain",
        "St. Louis Blues",
        "Brighton & Hove Albion",
        "Borussia Mönchengladbach",
        "Beşiktaş",
        "Internazionale",
        "fc",
        "",
        "Los Angeles Lakers",
        "Washington Redskins",
        "Crvena Zvezda Meridianbet",
    ];

    #[test]
    fn test_fold_name_strips_diacritics_and_punctuation() {
        assert_eq!(fold_name("Atlético  Madrid"), "atletico madrid");
        assert_eq!(fold_name("St. Louis Blues"), "st louis blues");
        assert_eq!(fold_name("Paris Saint-Germain"), "paris saint germain");
        assert_eq!(fold_name("Bayern München"), "bayern munchen");
        assert_eq!(fold_name("Beşiktaş"), "besiktas");
        assert_eq!(fold_name("Bodø/Glimt"), "bodo glimt");
    }

    #[test]
    fn test_strip_club_tokens() {
        assert_eq!(strip_club_tokens("afc bournemouth"), "bournemouth");
        assert_eq!(strip_club_tokens("chelsea fc"), "chelsea");
        assert_eq!(strip_club_tokens("fc sc porto"), "porto");
        assert_eq!(strip_club_tokens("fc"), "fc");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let matcher = TeamMatcher::default();
        for name in SAMPLE_NAMES {
            let once = matcher.normalize(name);
            assert_eq!(matcher.normalize(&once), once, "normalize not idempotent for {:?}", name);
        }
    }

    #[test]
    fn test_wolves_alias_equivalence() {
        let matcher = TeamMatcher::default();
        assert!(matcher.matches("Wolverhampton Wanderers", "Wolves"));
        assert!(matcher.matches("Wolves", "Wolverhampton Wanderers"));
        assert_eq!(
            matcher.normalize("Wolverhampton Wanderers"),
            matcher.normalize("Wolves")
        );
    }

    #[test]
    fn test_matches_diacritics_and_club_form() {
        let matcher = TeamMatcher::default();
        assert!(matcher.matches("Atlético Madrid", "Atletico de Madrid"));
        assert!(matcher.matches("Chelsea FC", "Chelsea"));
        assert!(matcher.matches("FC Bayern München", "Bayern Munich"));
    }

    #[test]
    fn test_matches_token_containment() {
        let matcher = TeamMatcher::default();
        // "leverkusen" is contained in "bayer leverkusen"
        assert!(matcher.matches("Bayer 04 Leverkusen", "Leverkusen"));
        // shared long token
        assert!(matcher.matches("Boston Celtics", "Celtics"));
    }

    #[test]
    fn test_matches_rejects_unrelated_and_empty() {
        let matcher = TeamMatcher::default();
        assert!(!matcher.matches("Chelsea", "Arsenal"));
        assert!(!matcher.matches("", "Arsenal"));
        assert!(!matcher.matches("Chelsea", "   "));
        // short tokens never count on their own
        assert!(!matcher.matches("AC Roma", "AC Pisa"));
    }

    #[test]
    fn test_similarity_ranks_exact_above_shared_city() {
        let matcher = TeamMatcher::default();
        let exact = matcher.similarity("Manchester City", "Man City");
        let rival = matcher.similarity("Manchester United", "Man City");
        assert!((exact - 1.0).abs() < 1e-9);
        assert!(rival < exact);
        assert!(rival > 0.0);
        assert_eq!(matcher.similarity("Chelsea", "Arsenal"), 0.0);
        assert_eq!(matcher.similarity("", "Arsenal"), 0.0);
    }

    #[test]
    fn test_contains_phrase_whole_words() {
        assert!(contains_phrase("miami heat vs boston", "miami heat"));
        assert!(!contains_phrase("wheat farmers", "heat"));
        assert!(!contains_phrase("heat", ""));
    }
}
