/// Parsers and serializers for the files a modpack translation touches
/// Lang files are flat key/value maps; quest files are trees that get
/// placeholders written into them and are rendered back after translation.
pub mod lang_file;
pub mod nbt;
pub mod snbt;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// `key=value` lines (1.12 and older)
    Lang,
    /// Flat JSON lang map, or a BetterQuesting database
    Json,
    /// FTB Quests text format
    Snbt,
    /// Legacy FTB Quests binary format
    Nbt,
    Unknown,
}

impl FileFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "lang" => Self::Lang,
            "json" => Self::Json,
            "snbt" => Self::Snbt,
            "nbt" => Self::Nbt,
            _ => Self::Unknown,
        }
    }

    /// Detect format from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn is_lang(self) -> bool {
        matches!(self, Self::Lang | Self::Json)
    }
}

/// Error for a path whose extension matches nothing we read.
pub(crate) fn unsupported(path: &Path) -> FormatError {
    FormatError::UnsupportedFormat(format!(
        "{} (expected .lang, .json, .snbt or .nbt)",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(FileFormat::from_path(Path::new("en_us.LANG")), FileFormat::Lang);
        assert_eq!(FileFormat::from_path(Path::new("a/b/zh_cn.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("chapters/intro.snbt")), FileFormat::Snbt);
        assert_eq!(FileFormat::from_path(Path::new("quests.nbt")), FileFormat::Nbt);
        assert_eq!(FileFormat::from_path(Path::new("readme")), FileFormat::Unknown);
        assert!(FileFormat::Json.is_lang());
        assert!(!FileFormat::Snbt.is_lang());
    }
}
