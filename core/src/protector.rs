use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// === Skip Patterns ===

// Image references inside quest text: "textures/gui/foo.png"
static IMAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:png|jpg)").expect("valid image regex"));

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[-\w.]|%[0-9a-fA-F]{2})+").expect("valid url regex")
});

// === Protected Tokens ===

// Ampersand formatting codes: &a, &l, &#FF00AA
static AMPERSAND_COLOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#[0-9A-Fa-f]{6}|[0-9a-fk-orA-FK-OR])").expect("valid ampersand color regex")
});

// Minecraft color codes: §a, §l, §r (section sign + code)
static MINECRAFT_COLOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"§[0-9A-FK-ORa-fk-or]").expect("valid Minecraft color regex")
});

// Item / tag references: #minecraft:logs, #forge:ingots
static ITEM_REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\w+:\w+\b").expect("valid item reference regex"));

static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"⟦MT:([A-Z_]+):([0-9]+)⟧").expect("valid marker regex"));

/// Why a text is passed through untranslated.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Image,
    RawJson,
    Url,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::Image => "contains an image reference",
            SkipReason::RawJson => "is a raw JSON text component",
            SkipReason::Url => "contains a URL",
        }
    }
}

/// Texts a provider would mangle. These keep their source text.
pub fn skip_reason(text: &str) -> Option<SkipReason> {
    if IMAGE_REGEX.is_match(text) {
        Some(SkipReason::Image)
    } else if text.contains("{\"") {
        Some(SkipReason::RawJson)
    } else if URL_REGEX.is_match(text) {
        Some(SkipReason::Url)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenClass {
    AmpersandColor, // &a, &#FF00AA
    MinecraftColor, // §a, §l
    ItemRef,        // #minecraft:logs
}

impl TokenClass {
    fn code(&self) -> &'static str {
        match self {
            TokenClass::AmpersandColor => "COLOR",
            TokenClass::MinecraftColor => "MCCOLOR",
            TokenClass::ItemRef => "ITEM",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedToken {
    #[serde(rename = "class")]
    pub kind: TokenClass,
    pub span: (usize, usize),
    pub value: String,
    pub marker: String,
}

#[derive(Debug, Clone)]
pub struct ProtectedFragment {
    original: String,
    masked: String,
    tokens: Vec<ProtectedToken>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtectorError {
    #[error("missing tokens: {0:?}")]
    MissingTokens(Vec<String>),
    #[error("unexpected tokens: {0:?}")]
    UnexpectedTokens(Vec<String>),
}

pub struct Protector;

impl Protector {
    /// Swap color codes and item references for numbered markers.
    pub fn protect(input: &str) -> ProtectedFragment {
        let mut occupied = vec![false; input.len()];
        let mut tokens = Vec::new();

        collect_tokens(
            &mut tokens,
            &mut occupied,
            input,
            TokenClass::ItemRef,
            &ITEM_REF_REGEX,
        );
        collect_tokens(
            &mut tokens,
            &mut occupied,
            input,
            TokenClass::AmpersandColor,
            &AMPERSAND_COLOR_REGEX,
        );
        collect_tokens(
            &mut tokens,
            &mut occupied,
            input,
            TokenClass::MinecraftColor,
            &MINECRAFT_COLOR_REGEX,
        );

        tokens.sort_by_key(|token| token.span.0);

        for (index, token) in tokens.iter_mut().enumerate() {
            token.marker = format!("⟦MT:{}:{}⟧", token.kind.code(), index);
        }

        let mut masked = String::with_capacity(input.len());
        let mut cursor = 0usize;
        for token in &tokens {
            let (start, end) = token.span;
            if start > cursor {
                masked.push_str(&input[cursor..start]);
            }
            masked.push_str(&token.marker);
            cursor = end;
        }
        if cursor < input.len() {
            masked.push_str(&input[cursor..]);
        }

        ProtectedFragment {
            original: input.to_string(),
            masked,
            tokens,
        }
    }
}

impl ProtectedFragment {
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn masked_text(&self) -> &str {
        &self.masked
    }

    pub fn tokens(&self) -> &[ProtectedToken] {
        &self.tokens
    }

    /// Put the protected values back. Every marker must survive translation
    /// and no unknown marker may appear.
    pub fn restore(&self, translated: &str) -> Result<String, ProtectorError> {
        if self.tokens.is_empty() {
            return Ok(translated.to_string());
        }

        let token_lookup: HashMap<&str, &ProtectedToken> = self
            .tokens
            .iter()
            .map(|token| (token.marker.as_str(), token))
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut unknown_markers = Vec::new();
        let mut output = String::with_capacity(translated.len());
        let mut cursor = 0usize;
        for matched in MARKER_REGEX.find_iter(translated) {
            let marker = matched.as_str();
            output.push_str(&translated[cursor..matched.start()]);

            if let Some(token) = token_lookup.get(marker) {
                output.push_str(&token.value);
                seen.insert(token.marker.as_str());
            } else {
                unknown_markers.push(marker.to_string());
                output.push_str(marker);
            }
            cursor = matched.end();
        }
        output.push_str(&translated[cursor..]);

        if !unknown_markers.is_empty() {
            return Err(ProtectorError::UnexpectedTokens(unknown_markers));
        }

        let missing: Vec<String> = self
            .tokens
            .iter()
            .filter(|token| !seen.contains(token.marker.as_str()))
            .map(|token| token.marker.clone())
            .collect();

        if !missing.is_empty() {
            return Err(ProtectorError::MissingTokens(missing));
        }

        Ok(output)
    }
}

fn collect_tokens(
    tokens: &mut Vec<ProtectedToken>,
    occupied: &mut [bool],
    input: &str,
    kind: TokenClass,
    regex: &Regex,
) {
    for mat in regex.find_iter(input) {
        let (start, end) = (mat.start(), mat.end());
        if start == end || occupied[start..end].iter().any(|taken| *taken) {
            continue;
        }
        for flag in &mut occupied[start..end] {
            *flag = true;
        }
        tokens.push(ProtectedToken {
            kind,
            span: (start, end),
            value: mat.as_str().to_string(),
            marker: String::new(),
        });
    }
}
