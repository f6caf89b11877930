/// Minecraft lang files: `.lang` (`key=value` lines, 1.12 and older) and
/// flat `.json` maps (1.13+)
use super::{unsupported, FileFormat, FormatError};
use crate::encoding;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Ordered key -> text map, in file order.
pub type KeyMap = IndexMap<String, String>;

/// Parse `key=value` lines.
///
/// Lines whose trimmed form starts with `#` are comments. The key is
/// everything before the first `=`; both sides are trimmed and the value is
/// taken literally (no unquoting).
pub fn parse_lang(text: &str) -> Result<KeyMap, FormatError> {
    let mut map = KeyMap::new();
    for (number, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            FormatError::ParseError(format!("line {} has no '=': {}", number + 1, trimmed))
        })?;
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

pub fn parse_json_lang(text: &str) -> Result<KeyMap, FormatError> {
    serde_json::from_str(text)
        .map_err(|e| FormatError::ParseError(format!("lang JSON must be a flat string map: {}", e)))
}

/// Read a `.lang` or `.json` lang file from disk.
pub fn read_lang_file(path: &Path) -> Result<KeyMap, FormatError> {
    let format = FileFormat::from_path(path);
    if !format.is_lang() {
        return Err(unsupported(path));
    }
    let text = encoding::read_text(path)?;
    parse_text(&text, format)
}

pub fn parse_text(text: &str, format: FileFormat) -> Result<KeyMap, FormatError> {
    match format {
        FileFormat::Lang => parse_lang(text),
        FileFormat::Json => parse_json_lang(text),
        other => Err(FormatError::UnsupportedFormat(format!(
            "{:?} is not a lang format",
            other
        ))),
    }
}

/// Render a map in the given lang format.
///
/// `.lang` values go through a JSON string encoder, so quotes and newlines are
/// escaped and the value is written quoted.
pub fn render(map: &KeyMap, format: FileFormat) -> Result<String, FormatError> {
    match format {
        FileFormat::Lang => {
            let mut out = String::new();
            for (key, value) in map {
                let encoded = serde_json::to_string(value)
                    .map_err(|e| FormatError::SerializationError(e.to_string()))?;
                out.push_str(key);
                out.push('=');
                out.push_str(&encoded);
                out.push('\n');
            }
            Ok(out)
        }
        FileFormat::Json => to_json_indented(map, b" "),
        other => Err(FormatError::UnsupportedFormat(format!(
            "{:?} is not a lang format",
            other
        ))),
    }
}

/// Serialize with a custom indent. serde_json never escapes non-ASCII.
pub fn to_json_indented<T: Serialize + ?Sized>(
    value: &T,
    indent: &[u8],
) -> Result<String, FormatError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| FormatError::SerializationError(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| FormatError::EncodingError(e.to_string()))
}

/// Render by extension and write atomically.
pub fn write_lang_file(path: &Path, map: &KeyMap) -> Result<(), FormatError> {
    let format = FileFormat::from_path(path);
    if !format.is_lang() {
        return Err(unsupported(path));
    }
    let text = render(map, format)?;
    crate::backup::write_atomic(path, text.as_bytes())?;
    Ok(())
}
