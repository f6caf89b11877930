/// Quest file extractors
///
/// Each opened quest file keeps the tree it parsed, a copy with translatable
/// strings swapped for placeholders, and the key -> source map pulled out.
/// Back-fill renders the placeholder copy and puts translations in.
pub mod better;
pub mod ftb;
pub mod legacy;

pub use better::BetterQuest;
pub use ftb::FtbQuest;
pub use legacy::LegacyFtbQuest;

use crate::encoding;
use crate::formats::lang_file::KeyMap;
use crate::formats::{unsupported, FileFormat, FormatError};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestKind {
    /// FTB Quests 1.18+ `.snbt`
    FtbSnbt,
    /// FTB Quests 1.16 `.snbt` with comma separators
    FtbLegacySnbt,
    /// FTB Quests 1.12 binary `.nbt`
    FtbNbt,
    /// BetterQuesting `DefaultQuests.json`
    BetterQuesting,
}

impl QuestKind {
    pub fn extension(self) -> &'static str {
        match self {
            QuestKind::FtbSnbt | QuestKind::FtbLegacySnbt => "snbt",
            QuestKind::FtbNbt => "nbt",
            QuestKind::BetterQuesting => "json",
        }
    }

    pub fn is_ftb(self) -> bool {
        !matches!(self, QuestKind::BetterQuesting)
    }
}

pub trait QuestDocument {
    fn kind(&self) -> QuestKind;

    /// File stem, used in FTB placeholder keys.
    fn name(&self) -> &str;

    fn source_path(&self) -> &Path;

    /// Placeholder key -> source text, in extraction order.
    fn extracted(&self) -> &KeyMap;

    /// The placeholder-bearing document in its own format, untranslated.
    fn localized_bytes(&self) -> Result<Vec<u8>, FormatError>;

    /// The document with `translations` substituted for their placeholders.
    /// Keys without a translation keep their placeholder.
    fn back_fill(&self, translations: &KeyMap) -> Result<Vec<u8>, FormatError>;
}

pub(crate) fn quest_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// True for a BetterQuesting database: a JSON object with a
/// `questDatabase...` key at the top level.
pub fn is_better_quest(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .map(|map| map.keys().any(|key| key.starts_with("questDatabase")))
        .unwrap_or(false)
}

/// Open a quest file, choosing the extractor from the extension (and, for
/// `.json`, the content).
pub fn open_quest(path: &Path) -> Result<Box<dyn QuestDocument>, FormatError> {
    match FileFormat::from_path(path) {
        FileFormat::Snbt => Ok(Box::new(FtbQuest::open(path)?)),
        FileFormat::Nbt => Ok(Box::new(LegacyFtbQuest::open(path)?)),
        FileFormat::Json => {
            let text = encoding::read_text(path)?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| FormatError::ParseError(format!("{}: {}", path.display(), e)))?;
            if !is_better_quest(&value) {
                return Err(FormatError::UnsupportedFormat(format!(
                    "{} is not a BetterQuesting database",
                    path.display()
                )));
            }
            Ok(Box::new(BetterQuest::from_value(path, value)))
        }
        _ => Err(unsupported(path)),
    }
}
