/// Per-document translation cache
///
/// One JSON file per source document, named by a fingerprint of the
/// document's path and bytes: `{ "<key>": { "ori": "...", "trans": "..." } }`.
/// Unchanged files map to the same cache file across runs; edited files
/// start fresh.
use crate::formats::lang_file::to_json_indented;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache serialization failed: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ori: String,
    pub trans: String,
}

pub type CacheMap = IndexMap<String, CacheEntry>;

/// Hex SHA-256 over the canonical path followed by the file content.
pub fn fingerprint(path: &Path, content: &[u8]) -> String {
    let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct TranslationCache {
    path: PathBuf,
    entries: CacheMap,
}

impl TranslationCache {
    /// Open the cache for `source` under `cache_dir`, creating an empty one
    /// on disk when none exists.
    pub fn open(cache_dir: &Path, source: &Path) -> Result<Self, CacheError> {
        let content = fs::read(source).map_err(|source_err| CacheError::Io {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        Self::open_for_content(cache_dir, source, &content)
    }

    /// Same as [`open`](Self::open) with the document bytes already in hand.
    pub fn open_for_content(
        cache_dir: &Path,
        source: &Path,
        content: &[u8],
    ) -> Result<Self, CacheError> {
        let path = cache_dir.join(format!("{}.json", fingerprint(source, content)));
        Self::open_at(path)
    }

    pub fn open_at(path: PathBuf) -> Result<Self, CacheError> {
        if !path.exists() {
            let cache = Self {
                path,
                entries: CacheMap::new(),
            };
            cache.save()?;
            log::debug!("created empty cache {}", cache.path.display());
            return Ok(cache);
        }

        let text = fs::read_to_string(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        let entries: CacheMap = serde_json::from_str(&text).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        log::debug!("loaded {} cached entries from {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &CacheMap {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Swap in a new entry set wholesale, returning the old keys that are not
    /// in the new set.
    pub fn replace(&mut self, entries: CacheMap) -> Vec<String> {
        let dropped = self
            .entries
            .keys()
            .filter(|key| !entries.contains_key(*key))
            .cloned()
            .collect();
        self.entries = entries;
        dropped
    }

    /// Write the whole map, 1-space indented.
    pub fn save(&self) -> Result<(), CacheError> {
        let text = to_json_indented(&self.entries, b" ")
            .map_err(|e| CacheError::Serialize(e.to_string()))?;
        crate::backup::write_atomic(&self.path, text.as_bytes()).map_err(|source| {
            CacheError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(ori: &str, trans: &str) -> CacheEntry {
        CacheEntry {
            ori: ori.to_string(),
            trans: trans.to_string(),
        }
    }

    #[test]
    fn fingerprint_depends_on_path_and_content() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.snbt");
        let b = dir.path().join("b.snbt");
        fs::write(&a, "x").unwrap();
        fs::write(&b, "x").unwrap();

        let fa = fingerprint(&a, b"x");
        assert_eq!(fa.len(), 64);
        assert_eq!(fa, fingerprint(&a, b"x"));
        assert_ne!(fa, fingerprint(&b, b"x"));
        assert_ne!(fa, fingerprint(&a, b"y"));
    }

    #[test]
    fn creates_then_reloads() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("en_us.json");
        fs::write(&source, "{}").unwrap();
        let cache_dir = dir.path().join("cache");

        let mut cache = TranslationCache::open(&cache_dir, &source).unwrap();
        assert!(cache.is_empty());
        assert_eq!(fs::read_to_string(cache.path()).unwrap(), "{}");

        let mut entries = CacheMap::new();
        entries.insert("k1".to_string(), entry("Apple", "苹果"));
        cache.replace(entries);
        cache.save().unwrap();

        let reopened = TranslationCache::open(&cache_dir, &source).unwrap();
        assert_eq!(reopened.path(), cache.path());
        assert_eq!(reopened.get("k1"), Some(&entry("Apple", "苹果")));
        assert_eq!(
            fs::read_to_string(reopened.path()).unwrap(),
            "{\n \"k1\": {\n  \"ori\": \"Apple\",\n  \"trans\": \"苹果\"\n }\n}"
        );
    }

    #[test]
    fn replace_reports_dropped_keys() {
        let dir = tempdir().unwrap();
        let mut cache = TranslationCache::open_at(dir.path().join("c.json")).unwrap();
        let mut old = CacheMap::new();
        old.insert("a".to_string(), entry("A", "甲"));
        old.insert("b".to_string(), entry("B", "乙"));
        cache.replace(old);

        let mut new = CacheMap::new();
        new.insert("b".to_string(), entry("B", "乙"));
        assert_eq!(cache.replace(new), vec!["a".to_string()]);
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            TranslationCache::open_at(path),
            Err(CacheError::Json { .. })
        ));
    }
}
