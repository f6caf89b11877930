/// Terminology glossary: known Minecraft terms and their accepted translations
///
/// The glossary file is a JSON object mapping a term to one translation or a
/// list of them. Lookups are case-insensitive.
use aho_corasick::AhoCorasick;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Terms this short or shorter are never matched inside running text.
const MIN_TERM_CHARS: usize = 3;
/// Hints returned per text.
pub const MAX_HINTS: usize = 5;
/// Fuzzy lookup score floor, 0.0 to 1.0.
const SIMILARITY_CUTOFF: f64 = 0.6;

#[derive(Debug, Error)]
pub enum GlossaryError {
    #[error("Failed to read glossary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Glossary {path} is not a term map: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build term matcher: {0}")]
    Matcher(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TermEntry {
    One(String),
    Many(Vec<String>),
}

impl From<TermEntry> for Vec<String> {
    fn from(entry: TermEntry) -> Self {
        match entry {
            TermEntry::One(text) => vec![text],
            TermEntry::Many(list) => list,
        }
    }
}

/// One glossary match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermHint {
    /// Lower-cased term.
    pub term: String,
    pub translations: Vec<String>,
}

#[derive(Debug)]
pub struct Glossary {
    terms: IndexMap<String, Vec<String>>,
    /// Pattern id -> index into `terms`.
    patterns: Vec<usize>,
    matcher: AhoCorasick,
}

impl Glossary {
    /// Build from a term map. Terms differing only in case collapse into the
    /// last one given.
    pub fn new(terms: IndexMap<String, Vec<String>>) -> Result<Self, GlossaryError> {
        let mut lowered: IndexMap<String, Vec<String>> = IndexMap::new();
        for (term, translations) in terms {
            lowered.insert(term.to_lowercase(), translations);
        }

        let patterns: Vec<usize> = lowered
            .keys()
            .enumerate()
            .filter(|(_, term)| term.chars().count() > MIN_TERM_CHARS)
            .map(|(index, _)| index)
            .collect();
        let needles = patterns
            .iter()
            .filter_map(|&index| lowered.get_index(index))
            .map(|(term, _)| term);
        let matcher =
            AhoCorasick::new(needles).map_err(|e| GlossaryError::Matcher(e.to_string()))?;

        log::debug!(
            "glossary loaded: {} terms, {} matchable in text",
            lowered.len(),
            patterns.len()
        );
        Ok(Self {
            terms: lowered,
            patterns,
            matcher,
        })
    }

    pub fn load(path: &Path) -> Result<Self, GlossaryError> {
        let text = fs::read_to_string(path).map_err(|source| GlossaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: IndexMap<String, TermEntry> =
            serde_json::from_str(&text).map_err(|source| GlossaryError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Exact lookup.
    pub fn get(&self, term: &str) -> Option<&[String]> {
        self.terms.get(&term.to_lowercase()).map(Vec::as_slice)
    }

    fn hint(&self, index: usize) -> Option<TermHint> {
        self.terms.get_index(index).map(|(term, translations)| TermHint {
            term: term.clone(),
            translations: translations.clone(),
        })
    }

    /// Terms occurring in `text`, overlapping matches included, longest term
    /// first, at most [`MAX_HINTS`].
    pub fn find(&self, text: &str) -> Vec<TermHint> {
        let lowered = text.to_lowercase();
        let mut found: Vec<usize> = Vec::new();
        for m in self.matcher.find_overlapping_iter(&lowered) {
            let index = self.patterns[m.pattern().as_usize()];
            if !found.contains(&index) {
                found.push(index);
            }
        }
        found.sort_by_key(|&index| {
            std::cmp::Reverse(self.terms.get_index(index).map_or(0, |(t, _)| t.chars().count()))
        });
        found
            .into_iter()
            .take(MAX_HINTS)
            .filter_map(|index| self.hint(index))
            .collect()
    }

    /// Terms spelled like `query`, best match first.
    pub fn similar(&self, query: &str, limit: usize) -> Vec<TermHint> {
        let query = query.to_lowercase();
        let mut scored: Vec<(f64, usize)> = self
            .terms
            .keys()
            .enumerate()
            .map(|(index, term)| (strsim::normalized_levenshtein(&query, term), index))
            .filter(|(score, _)| *score >= SIMILARITY_CUTOFF)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(limit)
            .filter_map(|(_, index)| self.hint(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Glossary {
        let mut terms = IndexMap::new();
        terms.insert("Iron Ingot".to_string(), vec!["铁锭".to_string()]);
        terms.insert("Iron".to_string(), vec!["铁".to_string()]);
        terms.insert("Ingot".to_string(), vec!["锭".to_string()]);
        terms.insert("Ore".to_string(), vec!["矿石".to_string()]);
        terms.insert(
            "Redstone".to_string(),
            vec!["红石".to_string(), "红石粉".to_string()],
        );
        Glossary::new(terms).unwrap()
    }

    #[test]
    fn finds_overlapping_terms_longest_first() {
        let glossary = sample();
        let hints = glossary.find("Smelt IRON ORE into an iron ingot");
        let terms: Vec<&str> = hints.iter().map(|h| h.term.as_str()).collect();
        // "ore" is too short to match inside text
        assert_eq!(terms, ["iron ingot", "ingot", "iron"]);
        assert_eq!(hints[0].translations, ["铁锭"]);
        assert!(glossary.find("Nothing here").is_empty());
    }

    #[test]
    fn caps_hints_per_text() {
        let terms: IndexMap<String, Vec<String>> = (0..8)
            .map(|i| (format!("term{}", i), vec![format!("词{}", i)]))
            .collect();
        let glossary = Glossary::new(terms).unwrap();
        let text = (0..8).map(|i| format!("term{}", i)).collect::<Vec<_>>().join(" ");
        assert_eq!(glossary.find(&text).len(), MAX_HINTS);
    }

    #[test]
    fn fuzzy_lookup() {
        let glossary = sample();
        let hints = glossary.similar("redston", 10);
        assert_eq!(hints[0].term, "redstone");
        assert_eq!(hints[0].translations, ["红石", "红石粉"]);
        assert!(glossary.similar("diamond", 10).is_empty());
        assert_eq!(glossary.get("ORE"), Some(["矿石".to_string()].as_slice()));
    }

    #[test]
    fn loads_string_or_list_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("terms.json");
        fs::write(&path, r#"{"Creeper": "苦力怕", "Nether": ["下界", "地狱"]}"#).unwrap();
        let glossary = Glossary::load(&path).unwrap();
        assert_eq!(glossary.len(), 2);
        assert_eq!(glossary.get("creeper"), Some(["苦力怕".to_string()].as_slice()));

        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(Glossary::load(&path), Err(GlossaryError::Json { .. })));
    }
}
