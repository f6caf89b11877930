/// Placeholder keys and substitution
///
/// Extracted strings are replaced by `{dotted.key}` tokens (FTB quests) or by
/// the bare key as a whole JSON string (BetterQuesting). Substitution is a
/// single left-to-right pass: a translation that itself contains `{other}` is
/// copied verbatim and never expanded again.
use indexmap::IndexMap;

/// Join path segments into a placeholder key. Segments are not escaped.
pub fn make_key<S: AsRef<str>>(segments: &[S]) -> String {
    let mut key = String::new();
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            key.push('.');
        }
        key.push_str(segment.as_ref());
    }
    key
}

/// `key` -> `{key}`
pub fn wrap(key: &str) -> String {
    format!("{{{}}}", key)
}

/// `{key}` -> `key`, if the whole input is exactly one braced token.
pub fn unwrap(token: &str) -> Option<&str> {
    let inner = token.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}']) {
        return None;
    }
    Some(inner)
}

/// Replace every `{key}` in `text` whose key is present in `translations`.
///
/// Keys never contain braces, so a `{` followed by another `{` before any `}`
/// cannot open a token. Unknown keys are left as they are.
pub fn substitute_all(text: &str, translations: &IndexMap<String, String>) -> String {
    if translations.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(close) = after.find(|c| c == '{' || c == '}') {
            if after.as_bytes()[close] == b'}' {
                if let Some(value) = translations.get(&after[..close]) {
                    out.push_str(value);
                    rest = &after[close + 1..];
                    continue;
                }
            }
        }
        out.push('{');
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Replace whole JSON string tokens whose raw content is a key.
///
/// Walks the text as JSON, so only complete string literals are candidates:
/// `"bq.name.1"` matches, `"bq.name.10"` and `"see bq.name.1"` do not. The
/// replacement goes between the existing quotes verbatim, so callers pass
/// values that are already escaped for JSON.
pub fn substitute_quoted(text: &str, translations: &IndexMap<String, String>) -> String {
    if translations.is_empty() {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut index = 0usize;
    while index < bytes.len() {
        if bytes[index] != b'"' {
            index += 1;
            continue;
        }
        let start = index + 1;
        let mut end = start;
        let mut escaped = false;
        while end < bytes.len() {
            match bytes[end] {
                b'\\' if !escaped => escaped = true,
                b'"' if !escaped => break,
                _ => escaped = false,
            }
            end += 1;
        }
        if end >= bytes.len() {
            break;
        }
        if let Some(value) = translations.get(&text[start..end]) {
            out.push_str(&text[cursor..start]);
            out.push_str(value);
            cursor = end;
        }
        index = end + 1;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Number of literal `{key}` occurrences in `text`.
pub fn count_occurrences(text: &str, key: &str) -> usize {
    text.matches(&wrap(key)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn joins_segments_with_dots() {
        let key = make_key(&["ftbquests", "chapter", "intro", "quests", "3", "title"]);
        assert_eq!(key, "ftbquests.chapter.intro.quests.3.title");
        assert_eq!(wrap(&key), "{ftbquests.chapter.intro.quests.3.title}");
        assert_eq!(unwrap("{a.b}"), Some("a.b"));
        assert_eq!(unwrap("{a}b}"), None);
        assert_eq!(unwrap("a.b"), None);
    }

    #[test]
    fn injected_placeholder_is_not_expanded() {
        let out = substitute_all("{a} and {b}", &map(&[("a", "X"), ("b", "{a}")]));
        assert_eq!(out, "X and {a}");
    }

    #[test]
    fn replaces_every_occurrence() {
        let out = substitute_all("{k}, again {k}!", &map(&[("k", "v")]));
        assert_eq!(out, "v, again v!");
    }

    #[test]
    fn prefix_keys_do_not_collide() {
        let translations = map(&[("q.title", "short"), ("q.title.1", "long")]);
        let out = substitute_all("[{q.title.1}] [{q.title}]", &translations);
        assert_eq!(out, "[long] [short]");
    }

    #[test]
    fn leaves_unknown_and_nested_braces_alone() {
        let translations = map(&[("k", "v")]);
        assert_eq!(substitute_all("{{k}}", &translations), "{v}");
        assert_eq!(substitute_all("{image:foo} {x}", &translations), "{image:foo} {x}");
        assert_eq!(substitute_all("dangling {k", &translations), "dangling {k");
    }

    #[test]
    fn quoted_substitution_matches_whole_tokens() {
        let translations = map(&[("bq.name.1", "One")]);
        let text = r#"{"a": "bq.name.1", "b": "bq.name.10", "c": "say \"bq.name.1\" twice"}"#;
        let out = substitute_quoted(text, &translations);
        assert_eq!(
            out,
            r#"{"a": "One", "b": "bq.name.10", "c": "say \"bq.name.1\" twice"}"#
        );
    }

    #[test]
    fn counts_literal_tokens() {
        assert_eq!(count_occurrences("{a} {a} {ab}", "a"), 2);
    }
}
