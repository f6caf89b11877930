/// In-memory model of a structured (SNBT) quest file
use indexmap::IndexMap;
use std::fmt;

/// A parsed quest node: map, sequence, or scalar leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestValue {
    Map(IndexMap<String, QuestValue>),
    Sequence(Vec<QuestValue>),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
    /// `[B; ...]`, `[I; ...]`, `[L; ...]`
    Array(TypedArray),
}

/// Numeric literal kept as written, so `0.0d` stays `0.0d` and `10L` stays `10L`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Number {
    pub literal: String,
    pub suffix: Option<char>,
}

impl Number {
    pub fn new(literal: impl Into<String>, suffix: Option<char>) -> Self {
        Self {
            literal: literal.into(),
            suffix,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)?;
        if let Some(suffix) = self.suffix {
            write!(f, "{}", suffix)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Byte,
    Int,
    Long,
}

impl ArrayKind {
    pub fn marker(self) -> char {
        match self {
            ArrayKind::Byte => 'B',
            ArrayKind::Int => 'I',
            ArrayKind::Long => 'L',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'B' => Some(ArrayKind::Byte),
            'I' => Some(ArrayKind::Int),
            'L' => Some(ArrayKind::Long),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedArray {
    pub kind: ArrayKind,
    pub items: Vec<Number>,
}

impl QuestValue {
    pub fn string(text: impl Into<String>) -> Self {
        QuestValue::Scalar(Scalar::String(text.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QuestValue::Scalar(Scalar::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, QuestValue>> {
        match self {
            QuestValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Map lookup; `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&QuestValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
