//! Static, read-only analysis tables
//!
//! Tables are TOML documents embedded at build time (see `tables/`) and parsed
//! once when the analyzer is constructed. Callers may supply replacement TOML
//! for any table. All maps are ordered so that every pass over a table visits
//! entries in the same order, which keeps floating-point sums bit-identical.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::text::{count_term, tokenize};

const KEYWORDS_TOML: &str = include_str!("../tables/keywords.toml");
const SENTIMENT_TOML: &str = include_str!("../tables/sentiment.toml");
const CATEGORIES_TOML: &str = include_str!("../tables/categories.toml");
const COUNTRIES_TOML: &str = include_str!("../tables/countries.toml");
const ESCALATION_TOML: &str = include_str!("../tables/escalation.toml");

/// Errors from loading a table
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to parse {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid {table} table: {reason}")]
    Invalid { table: &'static str, reason: String },
}

fn parse<T: for<'de> Deserialize<'de>>(table: &'static str, text: &str) -> Result<T, TableError> {
    toml::from_str(text).map_err(|source| TableError::Parse { table, source })
}

fn invalid(table: &'static str, reason: String) -> TableError {
    TableError::Invalid { table, reason }
}

fn normalize_term(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Risk keyword → weight in [-1, 1]
#[derive(Debug, Clone)]
pub struct KeywordLexicon {
    entries: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct KeywordFile {
    keywords: BTreeMap<String, f64>,
}

impl KeywordLexicon {
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_toml_str(KEYWORDS_TOML)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TableError> {
        let file: KeywordFile = parse("keyword", text)?;
        Self::from_entries(file.keywords)
    }

    pub fn from_entries<I, S>(entries: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (term, weight) in entries {
            let term = normalize_term(term.as_ref());
            if term.is_empty() {
                return Err(invalid("keyword", "empty keyword".to_string()));
            }
            if !weight.is_finite() || !(-1.0..=1.0).contains(&weight) {
                return Err(invalid("keyword", format!("weight {} of '{}' outside [-1, 1]", weight, term)));
            }
            map.insert(term, weight);
        }
        Ok(Self { entries: map })
    }

    /// Entries in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn weight(&self, term: &str) -> Option<f64> {
        self.entries.get(&normalize_term(term)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Word valences plus negation and intensifier modifiers
#[derive(Debug, Clone)]
pub struct SentimentLexicon {
    valence: BTreeMap<String, f64>,
    negations: BTreeSet<String>,
    intensifiers: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct SentimentFile {
    #[serde(default)]
    negations: Vec<String>,
    #[serde(default)]
    intensifiers: BTreeMap<String, f64>,
    valence: BTreeMap<String, f64>,
}

impl SentimentLexicon {
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_toml_str(SENTIMENT_TOML)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TableError> {
        let file: SentimentFile = parse("sentiment", text)?;
        if let Some((word, v)) = file.valence.iter().find(|(_, v)| !v.is_finite() || v.abs() > 4.0) {
            return Err(invalid("sentiment", format!("valence {} of '{}' outside [-4, 4]", v, word)));
        }
        Ok(Self {
            valence: file.valence.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect(),
            negations: file.negations.into_iter().map(|n| n.to_lowercase()).collect(),
            intensifiers: file.intensifiers.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect(),
        })
    }

    pub fn valence(&self, token: &str) -> Option<f64> {
        self.valence.get(token).copied()
    }

    pub fn is_negation(&self, token: &str) -> bool {
        self.negations.contains(token)
    }

    pub fn intensifier(&self, token: &str) -> Option<f64> {
        self.intensifiers.get(token).copied()
    }
}

/// One topic category with its base risk weight and cue terms
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub cues: Vec<String>,
}

/// Fixed topic taxonomy
#[derive(Debug, Clone)]
pub struct CategoryTaxonomy {
    categories: Vec<Category>,
    default_index: usize,
}

#[derive(Deserialize)]
struct CategoryFile {
    default_category: String,
    category: Vec<Category>,
}

impl CategoryTaxonomy {
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_toml_str(CATEGORIES_TOML)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TableError> {
        let file: CategoryFile = parse("category", text)?;
        let mut categories = file.category;

        for category in &mut categories {
            if !category.weight.is_finite() || !(0.0..=1.0).contains(&category.weight) {
                return Err(invalid(
                    "category",
                    format!("weight {} of '{}' outside [0, 1]", category.weight, category.name),
                ));
            }
            category.cues = category.cues.iter().map(|c| normalize_term(c)).collect();
        }

        let default_index = categories
            .iter()
            .position(|c| c.name == file.default_category)
            .ok_or_else(|| {
                invalid("category", format!("default category '{}' not defined", file.default_category))
            })?;

        Ok(Self { categories, default_index })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Category reported when no cue terms match
    pub fn default_category(&self) -> &Category {
        &self.categories[self.default_index]
    }

    pub fn base_weight(&self, name: &str) -> Option<f64> {
        self.categories.iter().find(|c| c.name == name).map(|c| c.weight)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CountryEntry {
    name: String,
    tier: f64,
    #[serde(default)]
    aliases: Vec<String>,
}

/// A resolved country lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CountryMatch {
    pub name: String,
    pub tier: f64,
}

/// Country name/alias → risk tier
#[derive(Debug, Clone)]
pub struct CountryRiskTable {
    /// (needle tokens joined by spaces, canonical name, tier), longest needle first
    needles: Vec<(String, String, f64)>,
}

#[derive(Deserialize)]
struct CountryFile {
    country: Vec<CountryEntry>,
}

/// Shortest query accepted as an abbreviation of a name
const MIN_PREFIX_LEN: usize = 4;

/// An abbreviation must leave out at least this many characters, so that
/// "niger" is never read as a truncated "nigeria"
const MIN_ELIDED_LEN: usize = 3;

fn needle_key(term: &str) -> String {
    tokenize(term).join(" ")
}

impl CountryRiskTable {
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_toml_str(COUNTRIES_TOML)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TableError> {
        let file: CountryFile = parse("country", text)?;
        let mut needles = Vec::new();

        for entry in file.country {
            if !entry.tier.is_finite() || !(0.0..=1.0).contains(&entry.tier) {
                return Err(invalid("country", format!("tier {} of '{}' outside [0, 1]", entry.tier, entry.name)));
            }
            let name = normalize_term(&entry.name);
            if needle_key(&name).is_empty() {
                return Err(invalid("country", "empty country name".to_string()));
            }
            needles.push((needle_key(&name), name.clone(), entry.tier));
            for alias in entry.aliases {
                let key = needle_key(&alias);
                if !key.is_empty() {
                    needles.push((key, name.clone(), entry.tier));
                }
            }
        }

        // Longest needle first so "south sudan" wins over "sudan"
        needles.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self { needles })
    }

    /// Case-insensitive lookup: exact name, then a name appearing as whole
    /// words in the query, then an abbreviated first word ("Switz")
    pub fn lookup(&self, country: &str) -> Option<CountryMatch> {
        let tokens = tokenize(country);
        if tokens.is_empty() {
            return None;
        }
        let query = tokens.join(" ");

        let found = self
            .needles
            .iter()
            .find(|(needle, _, _)| *needle == query)
            .or_else(|| self.needles.iter().find(|(needle, _, _)| count_term(&tokens, needle) > 0))
            .or_else(|| self.abbreviation(&tokens));

        found.map(|(_, name, tier)| CountryMatch { name: name.clone(), tier: *tier })
    }

    fn abbreviation(&self, tokens: &[String]) -> Option<&(String, String, f64)> {
        let [word] = tokens else {
            return None;
        };
        let len = word.chars().count();
        if len < MIN_PREFIX_LEN {
            return None;
        }

        self.needles.iter().find(|(needle, _, _)| {
            needle.split(' ').next().is_some_and(|first| {
                first.starts_with(word.as_str()) && first.chars().count() >= len + MIN_ELIDED_LEN
            })
        })
    }
}

/// Fixed escalation-indicator vocabulary
#[derive(Debug, Clone)]
pub struct EscalationVocabulary {
    terms: Vec<String>,
}

#[derive(Deserialize)]
struct EscalationFile {
    terms: Vec<String>,
}

impl EscalationVocabulary {
    pub fn embedded() -> Result<Self, TableError> {
        Self::from_toml_str(ESCALATION_TOML)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, TableError> {
        let file: EscalationFile = parse("escalation", text)?;
        let terms: BTreeSet<String> = file.terms.iter().map(|t| normalize_term(t)).filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Err(invalid("escalation", "vocabulary is empty".to_string()));
        }
        Ok(Self { terms: terms.into_iter().collect() })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// All tables the local analyzer needs
#[derive(Debug, Clone)]
pub struct Tables {
    pub keywords: KeywordLexicon,
    pub sentiment: SentimentLexicon,
    pub categories: CategoryTaxonomy,
    pub countries: CountryRiskTable,
    pub escalation: EscalationVocabulary,
}

impl Tables {
    /// Load the embedded default tables
    pub fn load_embedded() -> Result<Self, TableError> {
        Ok(Self {
            keywords: KeywordLexicon::embedded()?,
            sentiment: SentimentLexicon::embedded()?,
            categories: CategoryTaxonomy::embedded()?,
            countries: CountryRiskTable::embedded()?,
            escalation: EscalationVocabulary::embedded()?,
        })
    }
}
