/// BetterQuesting (`DefaultQuests.json`): key-name driven extraction
///
/// BetterQuesting types its keys (`name:8`, `desc:8`), so translatable
/// strings are found by key substring. Placeholders are bare keys,
/// `bq.name.<n>` and `bq.desc.<n>`, numbered in depth-first order.
use crate::encoding;
use crate::formats::lang_file::{to_json_indented, KeyMap};
use crate::formats::FormatError;
use crate::placeholder;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use super::{QuestDocument, QuestKind};

const NAME_MARKER: &str = "name:";
const DESC_MARKER: &str = "desc:";

/// Next free index per placeholder family, threaded through the walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCounters {
    pub name: usize,
    pub desc: usize,
}

/// Extract from a copy of `tree`; `tree` is not modified.
pub fn extract(tree: &Value) -> (KeyMap, Value) {
    let mut localized = tree.clone();
    let mut extracted = KeyMap::new();
    if let Value::Object(map) = &mut localized {
        traverse(map, IndexCounters::default(), &mut extracted);
    }
    (extracted, localized)
}

fn traverse(
    map: &mut Map<String, Value>,
    mut counters: IndexCounters,
    out: &mut KeyMap,
) -> IndexCounters {
    for (key, value) in map.iter_mut() {
        match value {
            Value::Object(child) => counters = traverse(child, counters, out),
            Value::String(text) if !text.is_empty() => {
                let placeholder = if key.contains(NAME_MARKER) {
                    counters.name += 1;
                    format!("bq.name.{}", counters.name - 1)
                } else if key.contains(DESC_MARKER) {
                    counters.desc += 1;
                    format!("bq.desc.{}", counters.desc - 1)
                } else {
                    continue;
                };
                let source = std::mem::replace(text, placeholder.clone());
                out.insert(placeholder, source);
            }
            _ => {}
        }
    }
    counters
}

/// Render with 4-space indent and replace whole placeholder string values.
pub fn back_fill(localized: &Value, translations: &KeyMap) -> Result<String, FormatError> {
    let text = to_json_indented(localized, b"    ")?;

    for key in translations.keys() {
        let token = format!("\"{}\"", key);
        let count = text.matches(&token).count();
        if count > 1 {
            return Err(FormatError::SerializationError(format!(
                "placeholder {} occurs {} times",
                key, count
            )));
        }
    }

    let mut escaped = KeyMap::new();
    for (key, value) in translations {
        let quoted = serde_json::to_string(value)
            .map_err(|e| FormatError::SerializationError(e.to_string()))?;
        escaped.insert(key.clone(), quoted[1..quoted.len() - 1].to_string());
    }
    Ok(placeholder::substitute_quoted(&text, &escaped))
}

#[derive(Debug, Clone)]
pub struct BetterQuest {
    name: String,
    source_path: PathBuf,
    original: Value,
    localized: Value,
    extracted: KeyMap,
}

impl BetterQuest {
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let text = encoding::read_text(path)?;
        let value = serde_json::from_str(&text)
            .map_err(|e| FormatError::ParseError(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_value(path, value))
    }

    pub fn from_value(path: &Path, original: Value) -> Self {
        let (extracted, localized) = extract(&original);
        log::info!(
            "{}: BetterQuesting database, {} strings extracted",
            path.display(),
            extracted.len()
        );
        Self {
            name: super::quest_name(path),
            source_path: path.to_path_buf(),
            original,
            localized,
            extracted,
        }
    }

    pub fn original(&self) -> &Value {
        &self.original
    }

    pub fn localized(&self) -> &Value {
        &self.localized
    }
}

impl QuestDocument for BetterQuest {
    fn kind(&self) -> QuestKind {
        QuestKind::BetterQuesting
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_path(&self) -> &Path {
        &self.source_path
    }

    fn extracted(&self) -> &KeyMap {
        &self.extracted
    }

    fn localized_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(to_json_indented(&self.localized, b" ")?.into_bytes())
    }

    fn back_fill(&self, translations: &KeyMap) -> Result<Vec<u8>, FormatError> {
        Ok(back_fill(&self.localized, translations)?.into_bytes())
    }
}
