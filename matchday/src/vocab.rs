//! Versioned lookup tables: team aliases and sport-classification keywords.
//!
//! Both tables ship with a built-in default and can be replaced or extended
//! from a JSON file, so vocabulary updates never touch control flow.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::teams::{fold_name, strip_club_tokens};
use crate::types::SportDomain;

// === Team aliases ===

/// Built-in alias groups: canonical name -> known variants (nicknames,
/// historical names, locale spellings).
static DEFAULT_TEAM_ALIASES: &[(&str, &[&str])] = &[
    // England
    ("wolves", &["wolverhampton", "wolverhampton wanderers"]),
    ("manchester united", &["man utd", "man united", "manchester utd", "mufc"]),
    ("manchester city", &["man city", "mcfc"]),
    ("tottenham", &["tottenham hotspur"]),
    ("newcastle", &["newcastle united", "newcastle utd"]),
    ("west ham", &["west ham united", "west ham utd"]),
    ("brighton", &["brighton and hove albion", "brighton hove albion"]),
    ("nottingham forest", &["nottm forest", "nott m forest", "nottingham"]),
    ("sheffield united", &["sheffield utd", "sheff utd"]),
    ("leeds", &["leeds united"]),
    ("leicester", &["leicester city"]),
    ("ipswich", &["ipswich town"]),
    ("luton", &["luton town"]),
    ("west brom", &["west bromwich albion", "west bromwich"]),
    ("qpr", &["queens park rangers"]),
    // Spain
    ("atletico madrid", &["atletico de madrid", "atl madrid", "club atletico de madrid"]),
    ("athletic club", &["athletic bilbao"]),
    ("real betis", &["betis", "real betis balompie"]),
    ("celta vigo", &["celta", "rc celta"]),
    // Germany
    ("bayern munich", &["bayern munchen", "bayern"]),
    ("borussia dortmund", &["dortmund", "bvb"]),
    ("borussia monchengladbach", &["monchengladbach", "gladbach", "b monchengladbach"]),
    ("bayer leverkusen", &["leverkusen", "bayer 04 leverkusen"]),
    ("rb leipzig", &["rasenballsport leipzig", "leipzig"]),
    ("eintracht frankfurt", &["frankfurt"]),
    // Italy
    ("inter", &["internazionale", "inter milan", "internazionale milano"]),
    ("milan", &["ac milan"]),
    ("roma", &["as roma"]),
    ("napoli", &["ssc napoli"]),
    // France
    ("paris saint germain", &["psg", "paris sg", "paris st germain"]),
    ("marseille", &["olympique marseille", "olympique de marseille"]),
    ("lyon", &["olympique lyonnais", "olympique lyon"]),
    // Portugal / Netherlands
    ("sporting cp", &["sporting lisbon", "sporting clube de portugal"]),
    ("psv", &["psv eindhoven"]),
    // NBA
    ("la clippers", &["los angeles clippers"]),
    ("la lakers", &["los angeles lakers"]),
    ("philadelphia 76ers", &["sixers", "76ers", "philadelphia sixers"]),
    // NHL
    ("montreal canadiens", &["canadiens", "habs"]),
    ("utah hockey club", &["utah hc"]),
    // NFL historical names
    ("washington commanders", &["washington football team", "washington redskins"]),
    ("las vegas raiders", &["oakland raiders"]),
    ("los angeles chargers", &["san diego chargers"]),
    ("los angeles rams", &["st louis rams"]),
];

/// One alias group as stored in an alias file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasGroup {
    pub canonical: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AliasFile {
    #[serde(default)]
    version: u32,
    groups: Vec<AliasGroup>,
}

/// Alias -> canonical name lookup. Keys and values are folded and stripped of
/// club-form tokens; chains are resolved so every value is a terminal name.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

fn alias_key(name: &str) -> String {
    strip_club_tokens(&fold_name(name))
}

impl AliasTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        let groups: Vec<AliasGroup> = DEFAULT_TEAM_ALIASES
            .iter()
            .map(|(canonical, aliases)| AliasGroup {
                canonical: canonical.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            })
            .collect();
        Self::default().with_groups(&groups)
    }

    /// Add groups on top of the current table.
    pub fn with_groups(mut self, groups: &[AliasGroup]) -> Self {
        for group in groups {
            let canonical = alias_key(&group.canonical);
            for alias in &group.aliases {
                let key = alias_key(alias);
                if key.is_empty() || canonical.is_empty() || key == canonical {
                    continue;
                }
                self.map.insert(key, canonical.clone());
            }
        }
        self.resolve_chains();
        self
    }

    /// Built-in table extended with the groups in a JSON alias file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read alias file {:?}", path.as_ref()))?;
        let file: AliasFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse alias file {:?}", path.as_ref()))?;
        tracing::info!(
            "Loaded {} alias groups (v{}) from {:?}",
            file.groups.len(),
            file.version,
            path.as_ref()
        );
        Ok(Self::builtin().with_groups(&file.groups))
    }

    /// Load from `path` when given, falling back to the built-in table.
    pub fn load_or_builtin<P: AsRef<Path>>(path: Option<P>) -> Self {
        match path {
            Some(p) => Self::load_from(p.as_ref()).unwrap_or_else(|e| {
                tracing::warn!("{:#}; using built-in aliases", e);
                Self::builtin()
            }),
            None => Self::builtin(),
        }
    }

    /// Canonical name for an already folded and stripped name.
    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Point every alias at the end of its chain. Cycles settle on their
    /// lexicographically smallest member.
    fn resolve_chains(&mut self) {
        let mut resolved: HashMap<String, String> = HashMap::with_capacity(self.map.len());
        for key in self.map.keys() {
            let mut seen: Vec<&str> = vec![key.as_str()];
            let mut current = key.as_str();
            let terminal = loop {
                match self.map.get(current) {
                    Some(next) => {
                        if let Some(pos) = seen.iter().position(|s| *s == next.as_str()) {
                            break seen[pos..]
                                .iter()
                                .min()
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| current.to_string());
                        }
                        seen.push(next.as_str());
                        current = next.as_str();
                    }
                    None => break current.to_string(),
                }
            };
            resolved.insert(key.clone(), terminal);
        }
        resolved.retain(|k, v| k != v);
        self.map = resolved;
    }
}

// === Sport classification vocabulary ===

/// Keywords that identify one sport domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub domain: SportDomain,
    pub keywords: Vec<String>,
}

/// Classification tables. Group order is priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportVocabulary {
    #[serde(default)]
    pub version: u32,
    /// Substrings of `sport_tag` that pin a forecast to soccer
    pub soccer_tags: Vec<String>,
    /// Substrings of `sport_tag` for the other domains
    pub explicit_tags: Vec<KeywordGroup>,
    /// Whole-word phrases looked up in the match label and league
    pub team_keywords: Vec<KeywordGroup>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn group(domain: SportDomain, keywords: &[&str]) -> KeywordGroup {
    KeywordGroup { domain, keywords: strings(keywords) }
}

impl Default for SportVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SportVocabulary {
    pub fn builtin() -> Self {
        Self {
            version: 1,
            soccer_tags: strings(&[
                "soccer", "epl", "premier_league", "la_liga", "laliga", "bundesliga",
                "serie_a", "seriea", "ligue_1", "ligue1", "ligue_one", "uefa",
                "champions_league", "europa", "eredivisie", "primeira", "mls",
                "efl", "fa_cup", "copa",
            ]),
            explicit_tags: vec![
                group(SportDomain::AmericanFootball, &["americanfootball", "american_football", "nfl", "ncaaf"]),
                group(SportDomain::Euroleague, &["euroleague"]),
                group(SportDomain::Basketball, &["basketball", "nba"]),
                group(SportDomain::Hockey, &["icehockey", "ice_hockey", "hockey", "nhl"]),
                group(SportDomain::Mma, &["mma", "mixed_martial_arts", "ufc"]),
            ],
            team_keywords: vec![
                group(SportDomain::AmericanFootball, &[
                    "chiefs", "new york jets", "ny jets", "eagles", "cowboys", "patriots",
                    "packers", "49ers", "niners", "steelers", "ravens", "bills", "dolphins",
                    "bengals", "browns", "texans", "colts", "jaguars", "titans", "broncos",
                    "raiders", "chargers", "new york giants", "ny giants", "commanders",
                    "chicago bears", "detroit lions", "vikings", "falcons", "carolina panthers",
                    "saints", "buccaneers", "arizona cardinals", "rams", "seahawks",
                ]),
                group(SportDomain::Euroleague, &[
                    "euroleague", "olympiacos", "panathinaikos", "fenerbahce", "anadolu efes",
                    "efes", "zalgiris", "baskonia", "virtus bologna", "olimpia milano", "ea7",
                    "asvel", "alba berlin", "maccabi tel aviv", "maccabi", "crvena zvezda",
                    "partizan", "paris basketball",
                ]),
                group(SportDomain::Basketball, &[
                    "nba", "lakers", "celtics", "warriors", "knicks", "brooklyn nets", "bulls",
                    "miami heat", "bucks", "76ers", "sixers", "raptors", "cavaliers", "pistons",
                    "pacers", "atlanta hawks", "hornets", "orlando magic", "wizards", "nuggets",
                    "timberwolves", "thunder", "trail blazers", "blazers", "utah jazz", "suns",
                    "clippers", "sacramento kings", "mavericks", "rockets", "grizzlies",
                    "pelicans", "san antonio spurs",
                ]),
                group(SportDomain::Hockey, &[
                    "nhl", "bruins", "maple leafs", "canadiens", "ottawa senators", "red wings",
                    "tampa bay lightning", "sabres", "penguins", "flyers", "capitals",
                    "islanders", "new jersey devils", "hurricanes", "blue jackets", "blackhawks",
                    "predators", "st louis blues", "wild", "avalanche", "dallas stars", "oilers",
                    "calgary flames", "canucks", "kraken", "golden knights", "anaheim ducks",
                    "san jose sharks", "utah hockey club", "winnipeg jets", "florida panthers",
                    "new york rangers", "los angeles kings", "la kings",
                ]),
                group(SportDomain::Mma, &[
                    "ufc", "bellator", "pfl", "one championship", "fight night", "mma",
                    "heavyweight", "light heavyweight", "middleweight", "welterweight",
                    "lightweight", "featherweight", "bantamweight", "flyweight", "strawweight",
                ]),
                group(SportDomain::Soccer, &[
                    "premier league", "la liga", "bundesliga", "serie a", "ligue 1",
                    "champions league", "europa league", "arsenal", "chelsea", "liverpool",
                    "everton", "fulham", "brentford", "wolves", "tottenham", "newcastle",
                    "aston villa", "crystal palace", "manchester united", "manchester city",
                    "real madrid", "barcelona", "atletico madrid", "sevilla", "valencia",
                    "villarreal", "real sociedad", "bayern munich", "borussia dortmund",
                    "juventus", "inter", "milan", "napoli", "lazio", "roma", "atalanta",
                    "paris saint germain", "marseille", "lyon", "benfica", "porto", "ajax",
                ]),
            ],
        }
        .folded()
    }

    /// Replace the built-in tables with a JSON vocabulary file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read vocabulary file {:?}", path.as_ref()))?;
        let vocab: SportVocabulary = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse vocabulary file {:?}", path.as_ref()))?;
        tracing::info!("Loaded sport vocabulary v{} from {:?}", vocab.version, path.as_ref());
        Ok(vocab.folded())
    }

    /// Load from `path` when given, falling back to the built-in tables.
    pub fn load_or_builtin<P: AsRef<Path>>(path: Option<P>) -> Self {
        match path {
            Some(p) => Self::load_from(p.as_ref()).unwrap_or_else(|e| {
                tracing::warn!("{:#}; using built-in sport vocabulary", e);
                Self::builtin()
            }),
            None => Self::builtin(),
        }
    }

    /// Tags are compared lowercase; keywords in folded form.
    fn folded(mut self) -> Self {
        for tag in self.soccer_tags.iter_mut() {
            *tag = tag.trim().to_lowercase();
        }
        for group in self.explicit_tags.iter_mut() {
            for tag in group.keywords.iter_mut() {
                *tag = tag.trim().to_lowercase();
            }
        }
        for group in self.team_keywords.iter_mut() {
            for kw in group.keywords.iter_mut() {
                *kw = fold_name(kw);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_aliases_resolve_to_terminals() {
        let table = AliasTable::builtin();
        assert!(!table.is_empty());
        assert_eq!(table.canonical("wolverhampton wanderers"), Some("wolves"));
        assert_eq!(table.canonical("wolves"), None);
        assert_eq!(table.canonical("washington redskins"), Some("washington commanders"));
    }

    #[test]
    fn test_alias_chains_and_cycles() {
        let groups = vec![
            AliasGroup { canonical: "b".into(), aliases: vec!["a".into()] },
            AliasGroup { canonical: "c".into(), aliases: vec!["b".into()] },
            AliasGroup { canonical: "y".into(), aliases: vec!["x".into()] },
            AliasGroup { canonical: "x".into(), aliases: vec!["y".into()] },
        ];
        let table = AliasTable::default().with_groups(&groups);
        assert_eq!(table.canonical("a"), Some("c"));
        assert_eq!(table.canonical("b"), Some("c"));
        assert_eq!(table.canonical("c"), None);
        assert_eq!(table.canonical("y"), Some("x"));
        assert_eq!(table.canonical("x"), None);
    }

    #[test]
    fn test_alias_file_extends_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"version": 2, "groups": [{{"canonical": "Man Utd", "aliases": ["Red Devils"]}}]}}"#
        )
        .unwrap();
        let table = AliasTable::load_from(file.path()).unwrap();
        // "man utd" is itself a built-in alias, so the chain resolves through it
        assert_eq!(table.canonical("red devils"), Some("manchester united"));
        assert_eq!(table.canonical("wolverhampton"), Some("wolves"));
    }

    #[test]
    fn test_alias_load_or_builtin_falls_back() {
        let table = AliasTable::load_or_builtin(Some("/definitely/not/here.json"));
        assert_eq!(table.len(), AliasTable::builtin().len());
    }

    #[test]
    fn test_vocabulary_file_replaces_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "version": 7,
                "soccer_tags": ["SOCCER"],
                "explicit_tags": [],
                "team_keywords": [{{"domain": "hockey", "keywords": ["Kärpät"]}}]
            }}"#
        )
        .unwrap();
        let vocab = SportVocabulary::load_from(file.path()).unwrap();
        assert_eq!(vocab.version, 7);
        assert_eq!(vocab.soccer_tags, vec!["soccer".to_string()]);
        assert_eq!(vocab.team_keywords[0].keywords, vec!["karpat".to_string()]);
    }
}
