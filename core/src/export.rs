//! Modpack extraction into the work folder
//!
//! Scans an instance folder for mods still lacking a translation and for
//! quest files, then writes what needs translating under the work folder:
//!
//! - `mods/<modid>/lang/<file>`: the mod's source lang file, as shipped
//! - `ftbquests/local/[chapters/]<name>.<ext>`: quest trees with placeholders
//! - `ftbquests/lang/en_us.<ext>`: every FTB placeholder key -> source text
//! - `betterquesting/local/DefaultQuests.json` and
//!   `betterquesting/lang/en_us.<ext>`: the same for BetterQuesting

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::archive::{self, ModArchive};
use crate::backup::write_atomic;
use crate::config::TranslatorConfig;
use crate::formats::lang_file::{self, to_json_indented, KeyMap};
use crate::formats::FileFormat;
use crate::quest::{BetterQuest, FtbQuest, LegacyFtbQuest, QuestDocument};
use crate::session::list_files;

const BETTER_QUESTS_FILE: &str = "DefaultQuests.json";

/// FTB files that live beside `chapters/` rather than in it.
const TOP_LEVEL_QUEST_FILES: [&str; 2] = ["data", "chapter_groups"];

/// What an instance folder has to offer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackScan {
    pub mods: Vec<ModArchive>,
    pub ftb_quests: Vec<PathBuf>,
    pub better_quests: Option<PathBuf>,
}

impl PackScan {
    pub fn total(&self) -> usize {
        self.mods.len() + self.ftb_quests.len() + usize::from(self.better_quests.is_some())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub mods: usize,
    pub ftb_quests: usize,
    pub better_quests: usize,
    /// Every file written, in write order.
    pub written: Vec<PathBuf>,
}

fn files_with_extension(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let files = list_files(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    Ok(files
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)))
                .unwrap_or(false)
        })
        .collect())
}

/// Look through `<pack>/resourcepacks`, `<pack>/mods`, `<pack>/config/ftbquests`
/// and `<pack>/config/betterquesting`.
///
/// A mod is listed when [`ModArchive::needs_translation`] says so against
/// the mods every i18n resource pack covers.
pub fn scan_pack(pack_dir: &Path, config: &TranslatorConfig) -> Result<PackScan> {
    let languages = &config.languages;

    let mut covered = HashSet::new();
    for pack in files_with_extension(&pack_dir.join("resourcepacks"), &["zip"])? {
        let mods = archive::resource_pack_mods(&pack, &languages.target_lang_file)
            .with_context(|| format!("Failed to read resource pack {}", pack.display()))?;
        covered.extend(mods);
    }

    let mut mods = Vec::new();
    for jar in files_with_extension(&pack_dir.join("mods"), &["jar"])? {
        let inspected = archive::inspect_mod(&jar)
            .with_context(|| format!("Failed to read mod {}", jar.display()))?;
        let needed = inspected
            .needs_translation(
                &covered,
                &languages.source_lang_file,
                &languages.target_lang_file,
            )
            .with_context(|| format!("Failed to read lang files of {}", jar.display()))?;
        if needed {
            mods.push(inspected);
        } else {
            log::debug!("{}: nothing to translate", inspected.mod_id());
        }
    }

    let config_dir = pack_dir.join("config");
    let ftb_quests = files_with_extension(&config_dir.join("ftbquests"), &["snbt", "nbt"])?;
    let better_quests = Some(config_dir.join("betterquesting").join(BETTER_QUESTS_FILE))
        .filter(|path| path.is_file());

    log::info!(
        "{}: {} mods to translate ({} covered by resource packs), {} FTB quest files, BetterQuesting: {}",
        pack_dir.display(),
        mods.len(),
        covered.len(),
        ftb_quests.len(),
        better_quests.is_some()
    );

    Ok(PackScan {
        mods,
        ftb_quests,
        better_quests,
    })
}

/// Copy a mod's source lang file to `<work>/mods/<modid>/lang/<file>`.
pub fn export_mod_lang(
    archive: &ModArchive,
    work_dir: &Path,
    source_stem: &str,
) -> Result<Option<PathBuf>> {
    let Some(lang_name) = archive.source_lang_file(source_stem) else {
        return Ok(None);
    };
    let text = archive
        .read_lang_text(lang_name)
        .with_context(|| {
            format!("Failed to read {} from {}", lang_name, archive.path().display())
        })?;
    let target = work_dir
        .join("mods")
        .join(archive.mod_id())
        .join("lang")
        .join(lang_name);
    write_atomic(&target, text.as_bytes())
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(Some(target))
}

fn open_ftb(path: &Path) -> Result<Box<dyn QuestDocument>> {
    let document: Box<dyn QuestDocument> = match FileFormat::from_path(path) {
        FileFormat::Nbt => Box::new(LegacyFtbQuest::open(path)?),
        _ => Box::new(FtbQuest::open(path)?),
    };
    Ok(document)
}

fn quest_lang_path(root: &Path, config: &TranslatorConfig) -> PathBuf {
    root.join("lang").join(format!(
        "{}.{}",
        config.languages.source_lang_file,
        config.lang_format.extension()
    ))
}

/// Merged quest lang map in the configured lang format. JSON uses a
/// 2-space indent here, unlike the 1-space lang files.
fn render_quest_lang(map: &KeyMap, config: &TranslatorConfig) -> Result<String> {
    if config.lang_format.low_version_lang_format {
        Ok(lang_file::render(map, FileFormat::Lang)?)
    } else {
        Ok(to_json_indented(map, b"  ")?)
    }
}

/// Write each FTB quest file's placeholder tree and one merged lang map.
/// Returns the files written; nothing is written for an empty list.
pub fn export_ftb_quests(
    paths: &[PathBuf],
    config: &TranslatorConfig,
    mut on_file: impl FnMut(&Path),
) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let root = config.folders.work_folder.join("ftbquests");
    let mut written = Vec::new();
    let mut merged = KeyMap::new();

    for path in paths {
        let document =
            open_ftb(path).with_context(|| format!("Failed to open quest {}", path.display()))?;
        let file_name = format!("{}.{}", document.name(), document.kind().extension());
        let local = if TOP_LEVEL_QUEST_FILES.contains(&document.name()) {
            root.join("local").join(file_name)
        } else {
            root.join("local").join("chapters").join(file_name)
        };
        let bytes = document.localized_bytes()?;
        write_atomic(&local, &bytes)
            .with_context(|| format!("Failed to write {}", local.display()))?;
        merged.extend(document.extracted().clone());
        written.push(local);
        on_file(path);
    }

    let lang_path = quest_lang_path(&root, config);
    let text = render_quest_lang(&merged, config)?;
    write_atomic(&lang_path, text.as_bytes())
        .with_context(|| format!("Failed to write {}", lang_path.display()))?;
    log::info!("{} FTB quest strings written to {}", merged.len(), lang_path.display());
    written.push(lang_path);
    Ok(written)
}

/// Write a BetterQuesting database's placeholder copy and its lang map.
pub fn export_better_quests(path: &Path, config: &TranslatorConfig) -> Result<Vec<PathBuf>> {
    let document = BetterQuest::open(path)
        .with_context(|| format!("Failed to open quest database {}", path.display()))?;
    let root = config.folders.work_folder.join("betterquesting");

    let local = root.join("local").join(BETTER_QUESTS_FILE);
    write_atomic(&local, &document.localized_bytes()?)
        .with_context(|| format!("Failed to write {}", local.display()))?;

    let lang_path = quest_lang_path(&root, config);
    let text = render_quest_lang(document.extracted(), config)?;
    write_atomic(&lang_path, text.as_bytes())
        .with_context(|| format!("Failed to write {}", lang_path.display()))?;
    log::info!(
        "{} BetterQuesting strings written to {}",
        document.extracted().len(),
        lang_path.display()
    );
    Ok(vec![local, lang_path])
}

/// Export everything in `scan` to the work folder. `on_progress` gets
/// (done, total) after each mod and quest file.
pub fn export_pack(
    scan: &PackScan,
    config: &TranslatorConfig,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<ExportSummary> {
    let total = scan.total();
    let mut done = 0;
    let mut summary = ExportSummary::default();
    let work_dir = &config.folders.work_folder;

    for archive in &scan.mods {
        let source_stem = &config.languages.source_lang_file;
        if let Some(path) = export_mod_lang(archive, work_dir, source_stem)? {
            summary.written.push(path);
            summary.mods += 1;
        }
        done += 1;
        on_progress(done, total);
    }

    let ftb_files = export_ftb_quests(&scan.ftb_quests, config, |_| {
        done += 1;
        on_progress(done, total);
    })?;
    summary.ftb_quests = scan.ftb_quests.len();
    summary.written.extend(ftb_files);

    if let Some(path) = &scan.better_quests {
        summary.written.extend(export_better_quests(path, config)?);
        summary.better_quests = 1;
        done += 1;
        on_progress(done, total);
    }

    log::info!(
        "exported {} mods, {} FTB quest files, {} BetterQuesting databases to {}",
        summary.mods,
        summary.ftb_quests,
        summary.better_quests,
        work_dir.display()
    );
    Ok(summary)
}
