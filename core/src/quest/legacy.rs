/// FTB Quests 1.12 (`.nbt`): the same walk over binary tags
///
/// Differs from the SNBT walk in one rule: a string that is a direct list
/// element qualifies whatever its keys are.
use crate::formats::lang_file::KeyMap;
use crate::formats::nbt::{self, NbtDocument, NbtTag};
use crate::formats::FormatError;
use crate::placeholder;
use std::path::{Path, PathBuf};

use super::ftb::{is_translatable_tag, is_translatable_text, key_prefix, quest_category};
use super::{QuestDocument, QuestKind};

pub fn extract(document: &NbtDocument, prefix: &[String]) -> (KeyMap, NbtDocument) {
    let mut localized = document.clone();
    let mut extracted = KeyMap::new();
    let mut path = prefix.to_vec();
    for (key, tag) in localized.root.iter_mut() {
        path.push(key.clone());
        walk(tag, &mut path, false, &mut extracted);
        path.pop();
    }
    (extracted, localized)
}

fn walk(tag: &mut NbtTag, path: &mut Vec<String>, in_list: bool, out: &mut KeyMap) {
    match tag {
        NbtTag::Compound(map) => {
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                walk(child, path, false, out);
                path.pop();
            }
        }
        NbtTag::List(list) => {
            let numbered = list.items.len() > 1;
            for (index, item) in list.items.iter_mut().enumerate() {
                if numbered {
                    path.push((index + 1).to_string());
                }
                walk(item, path, true, out);
                if numbered {
                    path.pop();
                }
            }
        }
        NbtTag::String(text) => {
            let tagged = path.last().map(|last| is_translatable_tag(last)).unwrap_or(false);
            if (tagged || in_list) && is_translatable_text(text) {
                let key = placeholder::make_key(path);
                let source = std::mem::replace(text, placeholder::wrap(&key));
                out.insert(key, source);
            }
        }
        _ => {}
    }
}

fn for_each_string(tag: &mut NbtTag, f: &mut dyn FnMut(&mut String)) {
    match tag {
        NbtTag::String(text) => f(text),
        NbtTag::Compound(map) => {
            for child in map.values_mut() {
                for_each_string(child, f);
            }
        }
        NbtTag::List(list) => {
            for item in list.items.iter_mut() {
                for_each_string(item, f);
            }
        }
        _ => {}
    }
}

/// Substitute translations into every string tag and encode. Values go in
/// raw; binary strings need no escaping.
pub fn back_fill(localized: &NbtDocument, translations: &KeyMap) -> Result<Vec<u8>, FormatError> {
    let mut output = localized.clone();

    let mut all_text = String::new();
    for tag in output.root.values_mut() {
        for_each_string(tag, &mut |text| {
            all_text.push_str(text);
            all_text.push('\n');
        });
    }
    super::ftb::check_collisions(&all_text, translations)?;

    for tag in output.root.values_mut() {
        for_each_string(tag, &mut |text| {
            if text.contains('{') {
                *text = placeholder::substitute_all(text, translations);
            }
        });
    }
    nbt::write(&output)
}

#[derive(Debug, Clone)]
pub struct LegacyFtbQuest {
    name: String,
    source_path: PathBuf,
    original: NbtDocument,
    localized: NbtDocument,
    extracted: KeyMap,
}

impl LegacyFtbQuest {
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(path, &bytes)
    }

    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self, FormatError> {
        let original = nbt::read(bytes)?;
        let name = super::quest_name(path);
        let category = quest_category(|key| original.root.contains_key(key));
        let (extracted, localized) = extract(&original, &key_prefix(category, &name));
        log::info!(
            "{}: binary quest file, {} strings extracted",
            path.display(),
            extracted.len()
        );
        Ok(Self {
            name,
            source_path: path.to_path_buf(),
            original,
            localized,
            extracted,
        })
    }

    pub fn original(&self) -> &NbtDocument {
        &self.original
    }

    pub fn localized(&self) -> &NbtDocument {
        &self.localized
    }
}

impl QuestDocument for LegacyFtbQuest {
    fn kind(&self) -> QuestKind {
        QuestKind::FtbNbt
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
        nbt::write(&self.localized)
    }

    fn back_fill(&self, translations: &KeyMap) -> Result<Vec<u8>, FormatError> {
        back_fill(&self.localized, translations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::nbt::{Compression, NbtList};
    use indexmap::IndexMap;

    fn string(text: &str) -> NbtTag {
        NbtTag::String(text.to_string())
    }

    fn sample() -> NbtDocument {
        let mut quest = IndexMap::new();
        quest.insert("title".to_string(), string("Wood"));
        quest.insert("icon".to_string(), string("minecraft:log"));
        quest.insert(
            "text".to_string(),
            NbtTag::List(NbtList {
                element_id: 8,
                items: vec![string("Chop"), string("{image:tree.png}"), string(" ")],
            }),
        );
        quest.insert(
            "tags".to_string(),
            NbtTag::List(NbtList {
                element_id: 8,
                items: vec![string("Starter")],
            }),
        );

        let mut root = IndexMap::new();
        root.insert("quest".to_string(), NbtTag::Compound(quest));
        root.insert("order".to_string(), NbtTag::Int(3));
        NbtDocument {
            name: String::new(),
            root,
            compression: Compression::Gzip,
        }
    }

    #[test]
    fn list_elements_qualify_without_a_tag_key() {
        let (extracted, localized) = extract(&sample(), &key_prefix("chapter", "stone"));
        let keys: Vec<&str> = extracted.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "ftbquests.chapter.stone.quest.title",
                "ftbquests.chapter.stone.quest.text.1",
                "ftbquests.chapter.stone.quest.tags",
            ]
        );
        let quest = match &localized.root["quest"] {
            NbtTag::Compound(map) => map,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(quest["icon"].as_str(), Some("minecraft:log"));
        assert_eq!(quest["title"].as_str(), Some("{ftbquests.chapter.stone.quest.title}"));
    }

    #[test]
    fn back_fill_writes_binary_with_translations() {
        let path = Path::new("stone.nbt");
        let bytes = nbt::write(&sample()).unwrap();
        let quest = LegacyFtbQuest::from_bytes(path, &bytes).unwrap();
        assert_eq!(quest.kind(), QuestKind::FtbNbt);

        let mut translations = KeyMap::new();
        translations.insert("ftbquests.chapter.stone.quest.title".into(), "木头 \"q\"".into());
        let out = nbt::read(&quest.back_fill(&translations).unwrap()).unwrap();
        assert_eq!(out.compression, Compression::Gzip);
        let quest_tag = match &out.root["quest"] {
            NbtTag::Compound(map) => map,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(quest_tag["title"].as_str(), Some("木头 \"q\""));

        let identity = quest.back_fill(quest.extracted()).unwrap();
        assert_eq!(nbt::read(&identity).unwrap(), sample());
    }
}
