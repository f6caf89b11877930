/// One open document: a lang file or a quest file, with its bilingual rows
///
/// A session owns the `Lang` derived from the document and, for quests, the
/// placeholder-bearing tree. Nothing is written next to the source until
/// [`Session::save_output`] has rendered the whole output successfully.
use crate::backup::{self, BackupError};
use crate::cache::CacheError;
use crate::config::TranslatorConfig;
use crate::formats::lang_file::{self, KeyMap};
use crate::formats::{unsupported, FileFormat, FormatError};
use crate::glossary::{Glossary, GlossaryError};
use crate::lang::{Lang, LangError, LangSource};
use crate::quest::{self, QuestDocument, QuestKind};
use crate::translate::{
    self, BatchProgress, BatchSummary, TranslateOptions, TranslationError, Translator,
};
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Folder next to the document that holds an older `en_us` + target pair.
pub const MIGRATION_DIR: &str = "old";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Lang(#[from] LangError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Glossary(#[from] GlossaryError),

    #[error("Migration folder is missing a file: {0}")]
    MigrationSource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "format")]
pub enum DocumentKind {
    LangFile(FileFormat),
    Quest(QuestKind),
}

pub struct Session {
    path: PathBuf,
    kind: DocumentKind,
    quest: Option<Box<dyn QuestDocument>>,
    lang: Lang,
    config: TranslatorConfig,
}

impl Session {
    /// Open `path` and attach its translation cache.
    ///
    /// `.lang`/`.json` files are lang files unless the JSON is a
    /// BetterQuesting database; `.snbt`/`.nbt` are FTB quests.
    pub fn open(path: &Path, config: &TranslatorConfig) -> Result<Self, SessionError> {
        let format = FileFormat::from_path(path);
        let quest = match format {
            FileFormat::Lang => None,
            _ => match quest::open_quest(path) {
                Ok(document) => Some(document),
                Err(FormatError::UnsupportedFormat(_)) if format == FileFormat::Json => None,
                Err(err) => return Err(err.into()),
            },
        };

        let cache_dir = config.cache_dir();
        let (kind, lang) = match quest {
            Some(ref document) => {
                let source = LangSource::FromMemory(document.extracted().clone());
                let lang = Lang::load_with_cache(source, &cache_dir, path)?;
                (DocumentKind::Quest(document.kind()), lang)
            }
            None => {
                let source = LangSource::FromFile(path.to_path_buf());
                let lang = Lang::load_with_cache(source, &cache_dir, path)?;
                (DocumentKind::LangFile(format), lang)
            }
        };

        log::info!(
            "opened {} as {:?}, {} rows",
            path.display(),
            kind,
            lang.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            quest,
            lang,
            config: config.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn lang(&self) -> &Lang {
        &self.lang
    }

    pub fn lang_mut(&mut self) -> &mut Lang {
        &mut self.lang
    }

    pub fn quest(&self) -> Option<&dyn QuestDocument> {
        self.quest.as_deref()
    }

    /// Options from the session's configuration, with the configured
    /// glossary loaded.
    pub fn translate_options(&self) -> Result<TranslateOptions, SessionError> {
        let mut options = TranslateOptions::from(&self.config);
        if let Some(path) = &self.config.folders.glossary_file {
            options.glossary = Some(Arc::new(Glossary::load(path)?));
        }
        Ok(options)
    }

    /// Persist pending translations to the cache.
    pub fn save_progress(&mut self) -> Result<PathBuf, SessionError> {
        Ok(self.lang.save_cache()?)
    }

    /// Run every row through `translator`, then save progress.
    ///
    /// Progress is saved even when the batch stops early: on cancellation,
    /// and before a provider error is returned.
    pub fn translate_all<F>(
        &mut self,
        translator: &mut dyn Translator,
        options: &TranslateOptions,
        on_progress: F,
    ) -> Result<BatchSummary, SessionError>
    where
        F: FnMut(&BatchProgress<'_>) -> ControlFlow<()>,
    {
        let result = translate::translate_lang(&mut self.lang, translator, options, on_progress);
        match (result, self.lang.save_cache()) {
            (Ok(summary), saved) => {
                saved?;
                Ok(summary)
            }
            (Err(err), saved) => {
                if let Err(cache_err) = saved {
                    log::warn!("progress not saved after a failed batch: {}", cache_err);
                }
                Err(err.into())
            }
        }
    }

    /// Import translations from `<document dir>/old/`, which must hold the
    /// previous version's source and target lang files (matched by the
    /// configured file stems anywhere below it). Returns the rows filled.
    pub fn migrate_from_dir(&mut self, old_dir: &Path) -> Result<usize, SessionError> {
        let source_stem = self.config.languages.source_lang_file.to_lowercase();
        let target_stem = self.config.languages.target_lang_file.to_lowercase();

        let mut old_source = None;
        let mut old_target = None;
        for file in list_files(old_dir).map_err(FormatError::from)? {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !FileFormat::from_path(&file).is_lang() {
                continue;
            }
            if name.contains(&target_stem) {
                old_target = Some(file);
            } else if name.contains(&source_stem) {
                old_source = Some(file);
            }
        }

        let old_source = old_source.ok_or_else(|| SessionError::MigrationSource(source_stem))?;
        let old_target = old_target.ok_or_else(|| SessionError::MigrationSource(target_stem))?;
        log::debug!(
            "migrating from {} and {}",
            old_source.display(),
            old_target.display()
        );

        let source_map = lang_file::read_lang_file(&old_source)?;
        let target_map = lang_file::read_lang_file(&old_target)?;
        Ok(self.lang.migrate(&source_map, &target_map))
    }

    /// [`migrate_from_dir`](Self::migrate_from_dir) on the `old` folder next
    /// to the document.
    pub fn migrate(&mut self) -> Result<usize, SessionError> {
        let dir = self
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(MIGRATION_DIR);
        self.migrate_from_dir(&dir)
    }

    fn output_translations(&self) -> KeyMap {
        if self.config.back_fill.fallback_to_source {
            self.lang.translations_or_source()
        } else {
            self.lang.translations()
        }
    }

    /// The translated document as bytes for `target`.
    ///
    /// Quests are back-filled in their own format. Lang files are written in
    /// the format `target`'s extension names, or the source's format when the
    /// extension is neither `.lang` nor `.json`.
    pub fn render_output(&self, target: &Path) -> Result<Vec<u8>, SessionError> {
        let translations = self.output_translations();
        match (&self.quest, self.kind) {
            (Some(document), _) => Ok(document.back_fill(&translations)?),
            (None, DocumentKind::LangFile(source_format)) => {
                let format = match FileFormat::from_path(target) {
                    format if format.is_lang() => format,
                    _ => source_format,
                };
                Ok(lang_file::render(&translations, format)?.into_bytes())
            }
            (None, DocumentKind::Quest(_)) => Err(unsupported(&self.path).into()),
        }
    }

    /// Render and write the output. With `keep_backup`, an existing file at
    /// `target` is copied aside first.
    pub fn save_output(&self, target: &Path, keep_backup: bool) -> Result<PathBuf, SessionError> {
        let bytes = self.render_output(target)?;
        if keep_backup {
            let outcome = backup::backup_and_swap(target, &bytes)?;
            if let Some(backup_path) = &outcome.backup_path {
                log::info!("previous output kept at {}", backup_path.display());
            }
            Ok(outcome.final_path)
        } else {
            backup::write_atomic(target, &bytes).map_err(BackupError::from)?;
            Ok(target.to_path_buf())
        }
    }

    /// `<document dir>/<target stem>.<ext>` for lang files, the document's
    /// own file name under `<document dir>/backfilled/` for quests.
    pub fn default_output_path(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        match self.kind {
            DocumentKind::LangFile(format) => {
                let ext = if format == FileFormat::Lang { "lang" } else { "json" };
                dir.join(format!("{}.{}", self.config.languages.target_lang_file, ext))
            }
            DocumentKind::Quest(_) => dir
                .join("backfilled")
                .join(self.path.file_name().unwrap_or_default()),
        }
    }
}

/// Every file below `dir`, depth first, sorted per directory.
pub(crate) fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries: Vec<_> = std::fs::read_dir(&current)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        entries.sort();
        for path in entries {
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}
