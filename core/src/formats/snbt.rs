/// SNBT: the text format FTB Quests stores chapters, groups and reward tables in
///
/// Grammar accepted by [`parse`]:
///
/// ```text
/// value    := compound | list | string | literal
/// compound := '{' (entry sep?)* '}'
/// entry    := key ':' value
/// key      := quoted | bare
/// list     := '[' ( [BIL] ';' (number sep?)* | (value sep?)* ) ']'
/// sep      := ',' | whitespace (newlines included)
/// string   := '"' chars '"' | '\'' chars '\''      escapes: \\ \" \' \n \r \t \b \f \uXXXX
/// literal  := [A-Za-z0-9_+.-]+                     true | false | number | bare string
/// number   := [-+]? digits ('.' digits)? exponent? [bBsSlLfFdD]?
/// ```
///
/// Modern FTB (1.18+) separates entries with newlines only. The 1.16 dialect
/// puts a comma after every entry; [`is_legacy_dialect`] sniffs that so the
/// same layout can be written back.
use super::FormatError;
use crate::tree::{ArrayKind, Number, QuestValue, Scalar, TypedArray};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static LEGACY_SEPARATOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#",\n(?:[^"]|\z)"#).expect("valid legacy separator regex"));

static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-+]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)([bBsSlLfFdD]?)$")
        .expect("valid number regex")
});

const MAX_DEPTH: usize = 512;

/// A comma directly followed by a newline that is not followed by a quote.
/// Expects LF line endings.
pub fn is_legacy_dialect(text: &str) -> bool {
    LEGACY_SEPARATOR_REGEX.is_match(text)
}

pub fn parse(text: &str) -> Result<QuestValue, FormatError> {
    let mut parser = Parser::new(text);
    parser.skip_whitespace();
    let value = parser.parse_value(0)?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error("unexpected content after the root value"));
    }
    Ok(value)
}

/// Render a tree. `compact` selects the legacy comma-terminated layout.
pub fn dumps(value: &QuestValue, compact: bool) -> Result<String, FormatError> {
    let mut writer = Writer {
        out: String::new(),
        compact,
    };
    writer.write_value(value, 0)?;
    writer.out.push('\n');
    Ok(writer.out)
}

/// Escape `text` for the inside of a double-quoted SNBT string.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn is_bare_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'+')
}

fn parse_number(token: &str) -> Option<Number> {
    let captures = NUMBER_REGEX.captures(token)?;
    let literal = captures.get(1)?.as_str();
    let suffix = captures.get(2).and_then(|m| m.as_str().chars().next());
    Some(Number::new(literal, suffix))
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, message: &str) -> FormatError {
        let consumed = &self.text[..self.pos.min(self.text.len())];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rsplit('\n')
            .next()
            .map(|tail| tail.chars().count() + 1)
            .unwrap_or(1);
        FormatError::ParseError(format!("SNBT {} at line {}, column {}", message, line, column))
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Whitespace with at most one comma in it.
    fn skip_separator(&mut self) {
        self.skip_whitespace();
        if self.peek() == Some(b',') {
            self.pos += 1;
            self.skip_whitespace();
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), FormatError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<QuestValue, FormatError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        match self.peek() {
            Some(b'{') => self.parse_compound(depth),
            Some(b'[') => self.parse_list(depth),
            Some(b'"') | Some(b'\'') => {
                Ok(QuestValue::Scalar(Scalar::String(self.parse_quoted()?)))
            }
            Some(c) if is_bare_char(c) => {
                let token = self.parse_bare();
                Ok(QuestValue::Scalar(match token {
                    "true" => Scalar::Bool(true),
                    "false" => Scalar::Bool(false),
                    _ => match parse_number(token) {
                        Some(number) => Scalar::Number(number),
                        None => Scalar::String(token.to_string()),
                    },
                }))
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_compound(&mut self, depth: usize) -> Result<QuestValue, FormatError> {
        self.expect(b'{')?;
        let mut map = IndexMap::new();
        self.skip_whitespace();
        loop {
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }
            let key = self.parse_key()?;
            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();
            let value = self.parse_value(depth + 1)?;
            if map.insert(key.clone(), value).is_some() {
                return Err(self.error(&format!("duplicate key '{}'", key)));
            }
            self.skip_separator();
        }
        Ok(QuestValue::Map(map))
    }

    fn parse_list(&mut self, depth: usize) -> Result<QuestValue, FormatError> {
        self.expect(b'[')?;
        self.skip_whitespace();

        if let (Some(marker), Some(b';')) = (self.peek(), self.bytes.get(self.pos + 1).copied()) {
            if let Some(kind) = ArrayKind::from_marker(marker as char) {
                self.pos += 2;
                return self.parse_typed_array(kind);
            }
        }

        let mut items = Vec::new();
        loop {
            if self.peek() == Some(b']') {
                self.pos += 1;
                break;
            }
            items.push(self.parse_value(depth + 1)?);
            self.skip_separator();
        }
        Ok(QuestValue::Sequence(items))
    }

    fn parse_typed_array(&mut self, kind: ArrayKind) -> Result<QuestValue, FormatError> {
        let mut items = Vec::new();
        self.skip_whitespace();
        loop {
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(c) if is_bare_char(c) => {
                    let token = self.parse_bare();
                    let number = parse_number(token)
                        .ok_or_else(|| self.error(&format!("'{}' is not a number", token)))?;
                    items.push(number);
                    self.skip_separator();
                }
                Some(_) => return Err(self.error("expected a number in typed array")),
                None => return Err(self.error("unterminated typed array")),
            }
        }
        Ok(QuestValue::Scalar(Scalar::Array(TypedArray { kind, items })))
    }

    fn parse_key(&mut self) -> Result<String, FormatError> {
        match self.peek() {
            Some(b'"') | Some(b'\'') => self.parse_quoted(),
            Some(c) if is_bare_char(c) => Ok(self.parse_bare().to_string()),
            Some(_) => Err(self.error("expected a key")),
            None => Err(self.error("unterminated compound")),
        }
    }

    fn parse_bare(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_bare_char(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.text[start..self.pos]
    }

    fn parse_quoted(&mut self) -> Result<String, FormatError> {
        let quote = self.bytes[self.pos];
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.text[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            if c as u32 == quote as u32 {
                self.pos += offset + 1;
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escaped = match chars.next() {
                Some((_, escaped)) => escaped,
                None => break,
            };
            match escaped {
                '\\' | '"' | '\'' => out.push(escaped),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'u' => {
                    let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32);
                    match decoded {
                        Some(decoded) => out.push(decoded),
                        None => {
                            self.pos += offset;
                            return Err(self.error(&format!("invalid unicode escape '\\u{}'", hex)));
                        }
                    }
                }
                other => {
                    self.pos += offset;
                    return Err(self.error(&format!("invalid escape '\\{}'", other)));
                }
            }
        }
        self.pos = self.bytes.len();
        Err(self.error("unterminated string"))
    }
}

struct Writer {
    out: String,
    compact: bool,
}

impl Writer {
    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push('\t');
        }
    }

    /// Newline between children; the legacy dialect puts a comma first.
    fn separator(&mut self, last: bool) {
        if self.compact && !last {
            self.out.push(',');
        }
        self.out.push('\n');
    }

    fn write_value(&mut self, value: &QuestValue, level: usize) -> Result<(), FormatError> {
        match value {
            QuestValue::Map(map) => self.write_map(map, level),
            QuestValue::Sequence(items) => self.write_sequence(items, level),
            QuestValue::Scalar(scalar) => self.write_scalar(scalar),
        }
    }

    fn write_map(
        &mut self,
        map: &IndexMap<String, QuestValue>,
        level: usize,
    ) -> Result<(), FormatError> {
        if map.is_empty() {
            self.out.push_str("{ }");
            return Ok(());
        }
        self.out.push_str("{\n");
        let count = map.len();
        for (index, (key, child)) in map.iter().enumerate() {
            self.indent(level + 1);
            self.write_key(key);
            self.out.push_str(": ");
            self.write_value(child, level + 1)?;
            self.separator(index + 1 == count);
        }
        self.indent(level);
        self.out.push('}');
        Ok(())
    }

    fn write_sequence(&mut self, items: &[QuestValue], level: usize) -> Result<(), FormatError> {
        if items.is_empty() {
            self.out.push_str("[ ]");
            return Ok(());
        }
        if let [QuestValue::Map(map)] = items {
            if !self.compact && !map.is_empty() {
                self.out.push('[');
                self.write_map(map, level)?;
                self.out.push(']');
                return Ok(());
            }
        }
        self.out.push_str("[\n");
        let count = items.len();
        for (index, item) in items.iter().enumerate() {
            self.indent(level + 1);
            self.write_value(item, level + 1)?;
            self.separator(index + 1 == count);
        }
        self.indent(level);
        self.out.push(']');
        Ok(())
    }

    fn write_scalar(&mut self, scalar: &Scalar) -> Result<(), FormatError> {
        match scalar {
            Scalar::String(text) => {
                self.out.push('"');
                self.out.push_str(&escape(text));
                self.out.push('"');
            }
            Scalar::Bool(flag) => self.out.push_str(if *flag { "true" } else { "false" }),
            Scalar::Number(number) => self.write_number(number)?,
            Scalar::Array(array) => {
                self.out.push('[');
                self.out.push(array.kind.marker());
                self.out.push(';');
                for (index, number) in array.items.iter().enumerate() {
                    self.out.push_str(if index == 0 { " " } else { ", " });
                    self.write_number(number)?;
                }
                self.out.push_str(if array.items.is_empty() { " ]" } else { "]" });
            }
        }
        Ok(())
    }

    fn write_number(&mut self, number: &Number) -> Result<(), FormatError> {
        let rendered = number.to_string();
        if parse_number(&rendered).as_ref() != Some(number) {
            return Err(FormatError::SerializationError(format!(
                "'{}' is not a valid SNBT number",
                rendered
            )));
        }
        self.out.push_str(&rendered);
        Ok(())
    }

    fn write_key(&mut self, key: &str) {
        if !key.is_empty() && key.bytes().all(is_bare_char) {
            self.out.push_str(key);
        } else {
            self.out.push('"');
            self.out.push_str(&escape(key));
            self.out.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = "{\n\tid: \"0A1B2C3D\"\n\ttitle: \"Getting Started\"\n\tquests: [\n\t\t{\n\t\t\tdescription: [\n\t\t\t\t\"Chop a tree\"\n\t\t\t\t\"\"\n\t\t\t]\n\t\t\ttasks: [{\n\t\t\t\titem: \"minecraft:oak_log\"\n\t\t\t\tcount: 16L\n\t\t\t}]\n\t\t\tx: -1.5d\n\t\t}\n\t\t{\n\t\t\tdependencies: [ ]\n\t\t\toptional: true\n\t\t}\n\t]\n\tcolor: [I; 1, 2, 3]\n}\n";

    #[test]
    fn parses_modern_layout() {
        let tree = parse(MODERN).unwrap();
        assert_eq!(tree.get("title").and_then(QuestValue::as_str), Some("Getting Started"));
        let quests = match tree.get("quests") {
            Some(QuestValue::Sequence(items)) => items,
            other => panic!("expected sequence, got {:?}", other),
        };
        assert_eq!(quests.len(), 2);
        assert_eq!(
            quests[0].get("x"),
            Some(&QuestValue::Scalar(Scalar::Number(Number::new("-1.5", Some('d')))))
        );
        assert_eq!(quests[1].get("optional"), Some(&QuestValue::Scalar(Scalar::Bool(true))));
    }

    #[test]
    fn modern_layout_is_reproduced_exactly() {
        let tree = parse(MODERN).unwrap();
        assert_eq!(dumps(&tree, false).unwrap(), MODERN);
    }

    #[test]
    fn legacy_layout_round_trips() {
        let legacy = "{\n\ttitle: \"Old\",\n\tquests: [\n\t\t{\n\t\t\tx: 0.0d,\n\t\t\tdescription: [\n\t\t\t\t\"a\",\n\t\t\t\t\"b\"\n\t\t\t]\n\t\t}\n\t]\n}\n";
        assert!(is_legacy_dialect(legacy));
        let tree = parse(legacy).unwrap();
        assert_eq!(dumps(&tree, true).unwrap(), legacy);
    }

    #[test]
    fn sniffs_dialect() {
        assert!(!is_legacy_dialect(MODERN));
        assert!(is_legacy_dialect("{\n\ta: 1,\n\tb: 2\n}"));
        // comma-newline before a quoted list item only
        assert!(!is_legacy_dialect("[\n\"a\",\n\"b\"\n]"));
        assert!(is_legacy_dialect("a,\n"));
    }

    #[test]
    fn handles_quotes_escapes_and_commas() {
        let tree = parse(r#"{"odd key": 'it\'s', plain: "say \"hi\"\nbye", n: 3b, word: minecraft:stone}"#);
        // ':' is not a bare character, so the unquoted id is a syntax error
        assert!(tree.is_err());

        let tree =
            parse(r#"{"odd key": 'it\'s', plain: "say \"hi\"\nbye", n: 3b, word: stone}"#)
                .unwrap();
        assert_eq!(tree.get("odd key").and_then(QuestValue::as_str), Some("it's"));
        assert_eq!(tree.get("plain").and_then(QuestValue::as_str), Some("say \"hi\"\nbye"));
        assert_eq!(tree.get("word").and_then(QuestValue::as_str), Some("stone"));

        let text = dumps(&tree, false).unwrap();
        assert!(text.contains("\t\"odd key\": \"it's\"\n"));
        assert!(text.contains("\tplain: \"say \\\"hi\\\"\\nbye\"\n"));
        assert_eq!(parse(&text).unwrap(), tree);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "{ title: \"open",
            "{ title \"x\" }",
            "{ a: 1 a: 2 }",
            "[I; 1, x]",
            "{ a: \"\\q\" }",
            "{ a: 1 } trailing",
            "",
        ] {
            match parse(bad) {
                Err(FormatError::ParseError(_)) => {}
                other => panic!("{:?} should fail to parse, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn reports_position() {
        let err = parse("{\n\ta: 1\n\tb: ?\n}").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn refuses_to_write_invalid_numbers() {
        let tree = QuestValue::Scalar(Scalar::Number(Number::new("1.2.3", None)));
        assert!(matches!(dumps(&tree, false), Err(FormatError::SerializationError(_))));
    }

    #[test]
    fn empty_containers() {
        let tree = parse("{ a: { }, b: [ ], c: [B; ] }").unwrap();
        assert_eq!(dumps(&tree, false).unwrap(), "{\n\ta: { }\n\tb: [ ]\n\tc: [B; ]\n}\n");
    }
}
