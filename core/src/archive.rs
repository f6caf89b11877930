//! Mod jar and resource pack inspection
//!
//! A mod jar carries its strings under `assets/<modid>/lang/`. A pack is
//! worth extracting from a mod when the mod has lang files, ships no target
//! language of its own, and is not already covered by an i18n resource pack.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use zip::read::ZipArchive;

use crate::encoding;

static ASSETS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"assets/([^/]+)").expect("valid assets regex"));

static LANG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"lang/([^/]+)").expect("valid lang regex"));

/// Lang files at or below this many characters are treated as empty.
const MIN_LANG_TEXT_CHARS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive not found: {0}")]
    NotFound(String),

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

fn open_archive(archive_path: &Path) -> ArchiveResult<ZipArchive<File>> {
    if !archive_path.exists() {
        return Err(ArchiveError::NotFound(archive_path.display().to_string()));
    }
    let file = File::open(archive_path)?;
    Ok(ZipArchive::new(file)?)
}

/// Read one entry by its exact name.
pub fn read_archive_entry(archive_path: &Path, entry_path: &str) -> ArchiveResult<Vec<u8>> {
    let mut archive = open_archive(archive_path)?;

    let mut entry = archive
        .by_name(entry_path)
        .map_err(|_| ArchiveError::EntryNotFound(entry_path.to_string()))?;

    let mut contents = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut contents)?;

    Ok(contents)
}

/// What a mod jar offers for translation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModArchive {
    path: PathBuf,
    mod_id: String,
    /// File names under `lang/`, in archive order (`en_us.json`, ...).
    lang_files: Vec<String>,
}

/// List a jar's mod id and lang files.
///
/// The mod id is the directory under `assets/` of the last entry that has
/// one; jars that bundle several asset roots are reported under the last.
pub fn inspect_mod(path: &Path) -> ArchiveResult<ModArchive> {
    let mut archive = open_archive(path)?;
    let mut mod_id = String::new();
    let mut lang_files = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name();
        if let Some(caps) = ASSETS_REGEX.captures(name) {
            mod_id = caps[1].to_string();
        }
        if let Some(caps) = LANG_REGEX.captures(name) {
            lang_files.push(caps[1].to_string());
        }
    }

    log::debug!(
        "{}: mod '{}', {} lang files",
        path.display(),
        mod_id,
        lang_files.len()
    );

    Ok(ModArchive {
        path: path.to_path_buf(),
        mod_id,
        lang_files,
    })
}

impl ModArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mod_id(&self) -> &str {
        &self.mod_id
    }

    pub fn lang_files(&self) -> &[String] {
        &self.lang_files
    }

    /// True if any lang file name contains `lang_stem`, ignoring case.
    /// Mods are inconsistent about `zh_CN.lang` vs `zh_cn.json`.
    pub fn has_lang(&self, lang_stem: &str) -> bool {
        let stem = lang_stem.to_lowercase();
        self.lang_files
            .iter()
            .any(|name| name.to_lowercase().contains(&stem))
    }

    /// The lang file to extract: the first one matching `lang_stem`,
    /// otherwise the first lang file.
    pub fn source_lang_file(&self, lang_stem: &str) -> Option<&str> {
        let stem = lang_stem.to_lowercase();
        self.lang_files
            .iter()
            .find(|name| name.to_lowercase().contains(&stem))
            .or_else(|| self.lang_files.first())
            .map(String::as_str)
    }

    /// Text of the first entry whose name contains `lang/<lang_name>`.
    pub fn read_lang_text(&self, lang_name: &str) -> ArchiveResult<String> {
        let needle = format!("lang/{}", lang_name);
        let mut archive = open_archive(&self.path)?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if !entry.name().contains(&needle) {
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            let (text, _) = encoding::decode(&bytes);
            return Ok(text);
        }

        Err(ArchiveError::EntryNotFound(needle))
    }

    /// Whether this mod still needs a translation pass.
    ///
    /// No when an i18n pack covers the mod id, the mod ships no lang files,
    /// the mod already ships `target_stem`, or its source lang file is
    /// (nearly) empty.
    pub fn needs_translation(
        &self,
        covered: &HashSet<String>,
        source_stem: &str,
        target_stem: &str,
    ) -> ArchiveResult<bool> {
        if covered.contains(&self.mod_id) || self.has_lang(target_stem) {
            return Ok(false);
        }
        let Some(lang_name) = self.source_lang_file(source_stem) else {
            return Ok(false);
        };
        let text = self.read_lang_text(lang_name)?;
        Ok(text.chars().count() > MIN_LANG_TEXT_CHARS)
    }
}

/// Mod ids an i18n resource pack translates into `target_stem`, in first
/// seen order.
pub fn resource_pack_mods(path: &Path, target_stem: &str) -> ArchiveResult<Vec<String>> {
    let needle = format!("lang/{}.", target_stem);
    let mut archive = open_archive(path)?;
    let mut mods: Vec<String> = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name();
        if !name.contains(&needle) {
            continue;
        }
        if let Some(caps) = ASSETS_REGEX.captures(name) {
            let mod_id = &caps[1];
            if !mods.iter().any(|known| known == mod_id) {
                mods.push(mod_id.to_string());
            }
        }
    }

    log::info!(
        "{}: resource pack covers {} mods",
        path.display(),
        mods.len()
    );
    Ok(mods)
}
