//! Parameter list encoding.
//!
//! Parameters are stored as a single text column next to a denormalized count.
//! "No parameters" always lands as [`EMPTY_PARAMS_SENTINEL`] with a count of
//! zero, however the caller spelled it.
//!
//! The count is derived textually: number of `,` characters plus one. This is
//! kept for compatibility with existing databases and breaks on parameter
//! names that themselves contain a comma.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored `Params` value meaning "no parameters".
pub const EMPTY_PARAMS_SENTINEL: &str = "null";

const SEPARATOR: char = ',';

/// Parameters as supplied by a caller: raw text (`"a,b"`, `"[\"a\",\"b\"]"`)
/// or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamsInput {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for ParamsInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamsInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ParamsInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Normalized parameter column pair, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedParams {
    text: String,
    count: u32,
}

impl EncodedParams {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            text: EMPTY_PARAMS_SENTINEL.to_string(),
            count: 0,
        }
    }

    #[must_use]
    pub fn encode(input: Option<&ParamsInput>) -> Self {
        let text = match input {
            None => return Self::empty(),
            Some(ParamsInput::Text(text)) => text.clone(),
            Some(ParamsInput::List(names)) if names.is_empty() => return Self::empty(),
            Some(ParamsInput::List(names)) => Value::from(names.clone()).to_string(),
        };

        if is_empty_spelling(text.trim()) {
            return Self::empty();
        }

        let separators = text.chars().filter(|&c| c == SEPARATOR).count();
        Self {
            count: u32::try_from(separators).unwrap_or(u32::MAX).saturating_add(1),
            text,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

fn is_empty_spelling(text: &str) -> bool {
    text.is_empty() || text == "[]" || text == EMPTY_PARAMS_SENTINEL
}

/// Decode a stored `Params` column back into an ordered list of names.
///
/// JSON arrays decode element-wise; anything else is treated as a flat
/// comma-separated list.
#[must_use]
pub fn decode_params(stored: &str) -> Vec<String> {
    let trimmed = stored.trim();
    if is_empty_spelling(trimmed) {
        return Vec::new();
    }

    if trimmed.starts_with('[')
        && let Ok(items) = serde_json::from_str::<Vec<Value>>(trimmed)
    {
        return items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
    }

    trimmed
        .split(SEPARATOR)
        .map(|piece| piece.trim().to_string())
        .collect()
}
