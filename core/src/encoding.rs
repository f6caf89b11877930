/// Text decoding for files we did not write ourselves
///
/// Lang files out of old mod jars are not always UTF-8, and Windows editors
/// like to prepend a BOM. Everything we write is plain UTF-8.
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Latin1,
}

impl Encoding {
    pub fn detect(content: &[u8]) -> Self {
        if content.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return Encoding::Utf8Bom;
        }
        if std::str::from_utf8(content).is_ok() {
            return Encoding::Utf8;
        }
        Encoding::Latin1
    }
}

/// Decode bytes, stripping a UTF-8 BOM. Invalid UTF-8 is read as Latin-1,
/// which cannot fail.
pub fn decode(bytes: &[u8]) -> (String, Encoding) {
    let encoding = Encoding::detect(bytes);
    let text = match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Utf8Bom => String::from_utf8_lossy(&bytes[3..]).into_owned(),
        // 0x00-0xFF map 1:1 onto U+0000-U+00FF
        Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
    };
    (text, encoding)
}

pub fn read_text(path: &Path) -> Result<String, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let (text, encoding) = decode(&bytes);
    if encoding == Encoding::Latin1 {
        log::debug!("{} is not UTF-8, decoded as Latin-1", path.display());
    }
    Ok(text)
}

/// CRLF -> LF. Dialect sniffing and line parsing only look for `\n`.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}
