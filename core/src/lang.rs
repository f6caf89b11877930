/// Bilingual record store
///
/// A `Lang` holds one document's ordered key -> source map and the rows the
/// user reviews: source text, the translation remembered in the cache, and
/// the translation produced or typed in this session.
use crate::cache::{CacheEntry, CacheError, CacheMap, TranslationCache};
use crate::formats::lang_file::{self, KeyMap};
use crate::formats::FormatError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LangError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("No row with key '{0}'")]
    UnknownKey(String),

    #[error("Row index {index} out of range ({len} rows)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No cache attached to this document")]
    NoCache,
}

/// Where a `Lang` gets its key -> source map from.
#[derive(Debug, Clone)]
pub enum LangSource {
    /// A `.lang` or `.json` lang file.
    FromFile(PathBuf),
    /// A map produced by quest extraction.
    FromMemory(KeyMap),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LangRecord {
    pub key: String,
    pub source: String,
    pub cached_translation: String,
    pub pending_translation: String,
}

impl LangRecord {
    fn new(key: &str, source: &str) -> Self {
        Self {
            key: key.to_string(),
            source: source.to_string(),
            cached_translation: String::new(),
            pending_translation: String::new(),
        }
    }

    /// Pending if set, otherwise the cached translation. May be empty.
    pub fn effective_translation(&self) -> &str {
        if self.pending_translation.is_empty() {
            &self.cached_translation
        } else {
            &self.pending_translation
        }
    }

    pub fn is_translated(&self) -> bool {
        !self.effective_translation().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Lang {
    file_path: Option<PathBuf>,
    entries: KeyMap,
    cache: Option<TranslationCache>,
    records: Vec<LangRecord>,
}

impl Lang {
    /// Load a document. Every call starts from scratch; nothing carries over
    /// from a previous document except through the on-disk cache.
    pub fn load(source: LangSource) -> Result<Self, LangError> {
        let (file_path, entries) = match source {
            LangSource::FromFile(path) => {
                let entries = lang_file::read_lang_file(&path)?;
                (Some(path), entries)
            }
            LangSource::FromMemory(entries) => (None, entries),
        };
        let mut lang = Self {
            file_path,
            entries,
            cache: None,
            records: Vec::new(),
        };
        lang.rebuild_records();
        Ok(lang)
    }

    /// Load and attach the cache identified by `identity` (path and bytes of
    /// the document the map came from).
    pub fn load_with_cache(
        source: LangSource,
        cache_dir: &Path,
        identity: &Path,
    ) -> Result<Self, LangError> {
        let mut lang = Self::load(source)?;
        lang.init_cache(cache_dir, identity)?;
        Ok(lang)
    }

    /// Open the cache for `identity` (creating it if missing) and re-derive
    /// the rows against it.
    pub fn init_cache(&mut self, cache_dir: &Path, identity: &Path) -> Result<(), LangError> {
        let cache = TranslationCache::open(cache_dir, identity)?;
        self.attach_cache(cache);
        Ok(())
    }

    pub fn attach_cache(&mut self, cache: TranslationCache) {
        self.cache = Some(cache);
        self.rebuild_records();
        log::info!(
            "{} rows, {} with a cached translation",
            self.records.len(),
            self.records
                .iter()
                .filter(|r| !r.cached_translation.is_empty())
                .count()
        );
    }

    fn rebuild_records(&mut self) {
        let cache = self.cache.as_ref();
        self.records = self
            .entries
            .iter()
            .map(|(key, source)| {
                let mut record = LangRecord::new(key, source);
                if let Some(entry) = cache.and_then(|c| c.get(key)) {
                    record.cached_translation = entry.trans.clone();
                }
                record
            })
            .collect();
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache.as_ref().map(TranslationCache::path)
    }

    /// Key -> source text, in document order.
    pub fn entries(&self) -> &KeyMap {
        &self.entries
    }

    /// Bilingual rows, in document order.
    pub fn records(&self) -> &[LangRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a machine translation for row `index`; it becomes both the
    /// cached and the pending translation.
    pub fn set_translation(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<(), LangError> {
        let len = self.records.len();
        let record = self
            .records
            .get_mut(index)
            .ok_or(LangError::IndexOutOfRange { index, len })?;
        let text = text.into();
        record.cached_translation = text.clone();
        record.pending_translation = text;
        Ok(())
    }

    /// Carry row `index`'s cached translation into the pending column so the
    /// next cache save keeps it. A pending edit wins over the cache.
    pub fn keep_cached(&mut self, index: usize) -> Result<(), LangError> {
        let len = self.records.len();
        let record = self
            .records
            .get_mut(index)
            .ok_or(LangError::IndexOutOfRange { index, len })?;
        if record.pending_translation.is_empty() {
            record.pending_translation = record.cached_translation.clone();
        }
        Ok(())
    }

    /// Manual edit of the pending translation.
    pub fn edit(&mut self, key: &str, text: impl Into<String>) -> Result<(), LangError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.key == key)
            .ok_or_else(|| LangError::UnknownKey(key.to_string()))?;
        record.pending_translation = text.into();
        Ok(())
    }

    /// Key -> effective translation, for rows that have one.
    pub fn translations(&self) -> KeyMap {
        self.records
            .iter()
            .filter(|r| r.is_translated())
            .map(|r| (r.key.clone(), r.effective_translation().to_string()))
            .collect()
    }

    /// Like [`translations`](Self::translations), with untranslated rows
    /// falling back to their source text.
    pub fn translations_or_source(&self) -> KeyMap {
        self.records
            .iter()
            .map(|r| {
                let text = if r.is_translated() {
                    r.effective_translation()
                } else {
                    &r.source
                };
                (r.key.clone(), text.to_string())
            })
            .collect()
    }

    /// Copy translations from an older version of the same document.
    ///
    /// A row takes the old translation when its source text equals an old
    /// source text; the old key does not have to match. Returns the number
    /// of rows filled.
    pub fn migrate(&mut self, old_source: &KeyMap, old_target: &KeyMap) -> usize {
        let mut by_text: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
        for (key, text) in old_source {
            if let Some(translated) = old_target.get(key).filter(|t| !t.is_empty()) {
                by_text.entry(text.as_str()).or_insert(translated.as_str());
            }
        }

        let mut imported = 0;
        for record in &mut self.records {
            if let Some(translated) = by_text.get(record.source.as_str()) {
                record.pending_translation = translated.to_string();
                imported += 1;
            }
        }
        log::info!("migrated {} of {} rows from old version", imported, self.records.len());
        imported
    }

    /// Rewrite the cache from the rows that have a pending translation.
    ///
    /// The cache is replaced wholesale: previously cached keys without a
    /// pending translation are dropped (and logged). With no pending rows at
    /// all the cache file is left as it is.
    pub fn save_cache(&mut self) -> Result<PathBuf, LangError> {
        let cache = self.cache.as_mut().ok_or(LangError::NoCache)?;

        let entries: CacheMap = self
            .records
            .iter()
            .filter(|r| !r.pending_translation.is_empty())
            .map(|r| {
                (
                    r.key.clone(),
                    CacheEntry {
                        ori: r.source.clone(),
                        trans: r.pending_translation.clone(),
                    },
                )
            })
            .collect();

        if entries.is_empty() {
            log::warn!(
                "nothing translated yet, cache {} left unchanged",
                cache.path().display()
            );
            return Ok(cache.path().to_path_buf());
        }

        let written = entries.len();
        let dropped = cache.replace(entries);
        if !dropped.is_empty() {
            log::warn!(
                "{} cached translations dropped from {} (no pending translation): {}",
                dropped.len(),
                cache.path().display(),
                dropped.join(", ")
            );
        }
        cache.save()?;
        log::info!("saved {} rows to cache {}", written, cache.path().display());
        Ok(cache.path().to_path_buf())
    }
}
