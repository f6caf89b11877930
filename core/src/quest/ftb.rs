/// FTB Quests (`.snbt`): tag-driven extraction over the parsed tree
use crate::encoding;
use crate::formats::lang_file::KeyMap;
use crate::formats::{snbt, FormatError};
use crate::placeholder;
use crate::tree::{QuestValue, Scalar};
use std::path::{Path, PathBuf};

use super::{QuestDocument, QuestKind};

/// Keys whose string values are player-facing text.
pub const TRANSLATABLE_TAGS: &[&str] = &[
    "title",
    "description",
    "subtitle",
    "text",
    "hover",
    "Lore",
    "Name",
];

/// Substrings marking rich-text directives that must stay untouched.
pub const STOP_TAGS: &[&str] = &["{image:", "{@pagebreak}"];

pub const NAMESPACE: &str = "ftbquests";

/// Has visible text and no stop directive.
pub fn is_translatable_text(text: &str) -> bool {
    text.chars().any(|c| !c.is_whitespace()) && !STOP_TAGS.iter().any(|tag| text.contains(tag))
}

pub(crate) fn is_translatable_tag(segment: &str) -> bool {
    TRANSLATABLE_TAGS.contains(&segment)
}

/// Which FTB file this tree is, from the marker keys at its top level.
pub fn quest_category(has_key: impl Fn(&str) -> bool) -> &'static str {
    if has_key("chapter_groups") {
        "chapter_groups"
    } else if has_key("loot_size") {
        "reward_tables"
    } else if has_key("disable_gui") {
        "data"
    } else {
        "chapter"
    }
}

/// `[ftbquests, <category>, <name>]`
pub fn key_prefix(category: &str, name: &str) -> Vec<String> {
    vec![NAMESPACE.to_string(), category.to_string(), name.to_string()]
}

/// Extract translatable strings from a copy of `tree`.
///
/// Returns the key -> source map in walk order and the copy with every
/// extracted leaf replaced by its `{key}` placeholder. `tree` itself is not
/// modified.
pub fn extract(tree: &QuestValue, prefix: &[String]) -> (KeyMap, QuestValue) {
    let mut localized = tree.clone();
    let mut extracted = KeyMap::new();
    let mut path = prefix.to_vec();
    walk(&mut localized, &mut path, false, &mut extracted);
    (extracted, localized)
}

fn qualifies(path: &[String], in_sequence: bool) -> bool {
    let Some(last) = path.last() else {
        return false;
    };
    if is_translatable_tag(last) {
        return true;
    }
    // Elements of a sequence also count when the sequence's own key does.
    in_sequence
        && path
            .len()
            .checked_sub(2)
            .map(|i| is_translatable_tag(&path[i]))
            .unwrap_or(false)
}

fn walk(node: &mut QuestValue, path: &mut Vec<String>, in_sequence: bool, out: &mut KeyMap) {
    match node {
        QuestValue::Map(map) => {
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                walk(child, path, false, out);
                path.pop();
            }
        }
        QuestValue::Sequence(items) => {
            // Singletons reuse the parent path so `[x]` and `x` key alike.
            let numbered = items.len() > 1;
            for (index, item) in items.iter_mut().enumerate() {
                if numbered {
                    path.push((index + 1).to_string());
                }
                walk(item, path, true, out);
                if numbered {
                    path.pop();
                }
            }
        }
        QuestValue::Scalar(Scalar::String(text)) => {
            if qualifies(path, in_sequence) && is_translatable_text(text) {
                let key = placeholder::make_key(path);
                let source = std::mem::replace(text, placeholder::wrap(&key));
                if out.insert(key.clone(), source).is_some() {
                    log::warn!("placeholder {} produced twice, keeping the later text", key);
                }
            }
        }
        QuestValue::Scalar(_) => {}
    }
}

/// Render the placeholder tree and substitute translations into the text.
///
/// Values are escaped for a double-quoted SNBT string before substitution.
/// Fails when a translated key's placeholder occurs more than once in the
/// rendered text, which means a literal value collides with it.
pub fn back_fill(
    localized: &QuestValue,
    compact: bool,
    translations: &KeyMap,
) -> Result<String, FormatError> {
    let text = snbt::dumps(localized, compact)?;
    check_collisions(&text, translations)?;
    let escaped: KeyMap = translations
        .iter()
        .map(|(key, value)| (key.clone(), snbt::escape(value)))
        .collect();
    Ok(placeholder::substitute_all(&text, &escaped))
}

pub(crate) fn check_collisions(text: &str, translations: &KeyMap) -> Result<(), FormatError> {
    for key in translations.keys() {
        let count = placeholder::count_occurrences(text, key);
        if count > 1 {
            return Err(FormatError::SerializationError(format!(
                "placeholder {{{}}} occurs {} times",
                key, count
            )));
        }
    }
    Ok(())
}

/// An opened `.snbt` quest file.
#[derive(Debug, Clone)]
pub struct FtbQuest {
    name: String,
    source_path: PathBuf,
    legacy: bool,
    original: QuestValue,
    localized: QuestValue,
    extracted: KeyMap,
}

impl FtbQuest {
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let text = encoding::read_text(path)?;
        Self::from_text(path, &text)
    }

    /// Parse and extract. `path` supplies the quest name (file stem) and is
    /// recorded as the source; it is not read.
    pub fn from_text(path: &Path, text: &str) -> Result<Self, FormatError> {
        let text = encoding::normalize_newlines(text);
        let legacy = snbt::is_legacy_dialect(&text);
        let original = snbt::parse(&text)?;
        let name = super::quest_name(path);
        let category = quest_category(|key| original.contains_key(key));
        let (extracted, localized) = extract(&original, &key_prefix(category, &name));
        log::info!(
            "{}: {} quest file, {} strings extracted",
            path.display(),
            if legacy { "legacy" } else { "modern" },
            extracted.len()
        );
        Ok(Self {
            name,
            source_path: path.to_path_buf(),
            legacy,
            original,
            localized,
            extracted,
        })
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Tree as parsed, before extraction.
    pub fn original(&self) -> &QuestValue {
        &self.original
    }

    pub fn localized(&self) -> &QuestValue {
        &self.localized
    }
}

impl QuestDocument for FtbQuest {
    fn kind(&self) -> QuestKind {
        if self.legacy {
            QuestKind::FtbLegacySnbt
        } else {
            QuestKind::FtbSnbt
        }
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
        Ok(snbt::dumps(&self.localized, self.legacy)?.into_bytes())
    }

    fn back_fill(&self, translations: &KeyMap) -> Result<Vec<u8>, FormatError> {
        Ok(back_fill(&self.localized, self.legacy, translations)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> Vec<String> {
        key_prefix("chapter", "intro")
    }

    #[test]
    fn extracts_by_tag_and_position() {
        let tree = snbt::parse(
            r#"{
                title: "Welcome"
                quests: [
                    { title: "First" description: ["Line one", "Line two"] id: "A1" }
                    { subtitle: "Second" description: ["Only line"] icon: "minecraft:apple" }
                ]
            }"#,
        )
        .unwrap();
        let (extracted, localized) = extract(&tree, &prefix());

        let keys: Vec<&str> = extracted.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "ftbquests.chapter.intro.title",
                "ftbquests.chapter.intro.quests.1.title",
                "ftbquests.chapter.intro.quests.1.description.1",
                "ftbquests.chapter.intro.quests.1.description.2",
                "ftbquests.chapter.intro.quests.2.subtitle",
                "ftbquests.chapter.intro.quests.2.description",
            ]
        );
        assert_eq!(extracted["ftbquests.chapter.intro.quests.2.description"], "Only line");

        let second = match localized.get("quests") {
            Some(QuestValue::Sequence(items)) => &items[1],
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            second.get("icon").and_then(QuestValue::as_str),
            Some("minecraft:apple")
        );
        assert_eq!(
            second.get("subtitle").and_then(QuestValue::as_str),
            Some("{ftbquests.chapter.intro.quests.2.subtitle}")
        );
        // the input tree is untouched
        assert_eq!(tree.get("title").and_then(QuestValue::as_str), Some("Welcome"));
    }

    #[test]
    fn skips_stop_tags_and_blank_text() {
        let tree = snbt::parse(
            r#"{ title: "{image:foo}" subtitle: "   " description: ["{@pagebreak}", "Real"] }"#,
        )
        .unwrap();
        let (extracted, localized) = extract(&tree, &prefix());
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted["ftbquests.chapter.intro.description.2"], "Real");
        assert_eq!(localized.get("title").and_then(QuestValue::as_str), Some("{image:foo}"));
        assert_eq!(localized.get("subtitle").and_then(QuestValue::as_str), Some("   "));
    }

    #[test]
    fn key_and_singleton_list_do_not_collide() {
        let tree = snbt::parse(r#"{ title: "A" text: ["B"] tasks: [{ title: "C" }] }"#).unwrap();
        let (extracted, _) = extract(&tree, &prefix());
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted["ftbquests.chapter.intro.title"], "A");
        assert_eq!(extracted["ftbquests.chapter.intro.text"], "B");
        assert_eq!(extracted["ftbquests.chapter.intro.tasks.title"], "C");
    }

    #[test]
    fn list_elements_check_the_list_key() {
        let tree = snbt::parse(
            r#"{ description: ["a", "b"] other: ["x", "y"] hover: [["c", "d"], ["e", "f"]] }"#,
        )
        .unwrap();
        let (extracted, _) = extract(&tree, &prefix());
        let keys: Vec<&str> = extracted.keys().map(String::as_str).collect();
        // nested list elements sit under an index, not under "hover"
        assert_eq!(
            keys,
            [
                "ftbquests.chapter.intro.description.1",
                "ftbquests.chapter.intro.description.2",
            ]
        );
    }

    #[test]
    fn category_comes_from_marker_keys() {
        let cases = [
            ("{ chapter_groups: [ ] }", "chapter_groups"),
            ("{ loot_size: 1 }", "reward_tables"),
            ("{ disable_gui: false }", "data"),
            ("{ title: \"x\" }", "chapter"),
        ];
        for (text, expected) in cases {
            let tree = snbt::parse(text).unwrap();
            assert_eq!(quest_category(|key| tree.contains_key(key)), expected);
        }
    }

    #[test]
    fn back_fill_with_source_text_reproduces_original() {
        let text = "{\n\ttitle: \"Say \\\"hi\\\"\"\n\tdescription: [\n\t\t\"Line {one}\"\n\t\t\"\"\n\t]\n\tx: 10L\n}\n";
        let quest = FtbQuest::from_text(Path::new("intro.snbt"), text).unwrap();
        assert_eq!(quest.kind(), QuestKind::FtbSnbt);
        let out = String::from_utf8(quest.back_fill(quest.extracted()).unwrap()).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn back_fill_substitutes_and_escapes() {
        let quest = FtbQuest::from_text(
            Path::new("intro.snbt"),
            "{\n\ttitle: \"Hello\"\n\tsubtitle: \"World\"\n}\n",
        )
        .unwrap();
        let mut translations = KeyMap::new();
        translations.insert("ftbquests.chapter.intro.title".into(), "“你好” \"q\"".into());
        let out = String::from_utf8(quest.back_fill(&translations).unwrap()).unwrap();
        assert_eq!(
            out,
            "{\n\ttitle: \"“你好” \\\"q\\\"\"\n\tsubtitle: \"{ftbquests.chapter.intro.subtitle}\"\n}\n"
        );
    }

    #[test]
    fn literal_placeholder_collision_is_an_error() {
        let quest = FtbQuest::from_text(
            Path::new("intro.snbt"),
            "{ title: \"Hello\" id: \"{ftbquests.chapter.intro.title}\" }",
        )
        .unwrap();
        let mut translations = KeyMap::new();
        translations.insert("ftbquests.chapter.intro.title".into(), "你好".into());
        assert!(matches!(
            quest.back_fill(&translations),
            Err(FormatError::SerializationError(_))
        ));
    }

    #[test]
    fn legacy_dialect_is_written_back_with_commas() {
        let text = "{\r\n\ttitle: \"Old\",\r\n\tx: 1\r\n}\r\n";
        let quest = FtbQuest::from_text(Path::new("old.snbt"), text).unwrap();
        assert!(quest.is_legacy());
        assert_eq!(quest.kind(), QuestKind::FtbLegacySnbt);
        let out = String::from_utf8(quest.back_fill(quest.extracted()).unwrap()).unwrap();
        assert_eq!(out, "{\n\ttitle: \"Old\",\n\tx: 1\n}\n");
    }

    #[test]
    fn parse_failure_aborts() {
        assert!(matches!(
            FtbQuest::from_text(Path::new("bad.snbt"), "{ title: "),
            Err(FormatError::ParseError(_))
        ));
    }
}
