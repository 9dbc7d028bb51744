//! Core domain types for the lexicon.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The registry, the configuration loader and the HTTP layer all speak these types.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod params;
mod term;

pub use params::{EMPTY_PARAMS_SENTINEL, EncodedParams, ParamsInput, decode_params};
pub use term::{Ack, AckStatus, TermDefinition, TermDoc, TermRecord, decode_definition};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Term names
// ============================================================================

/// The unique, case-sensitive name of a term.
///
/// Guaranteed non-empty after trimming. The original text is kept as given;
/// `"Greet"` and `"greet"` are different terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TermName(String);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("term name must not be empty")]
pub struct EmptyTermName;

impl TermName {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyTermName> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyTermName)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TermName {
    type Error = EmptyTermName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TermName {
    type Error = EmptyTermName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TermName> for String {
    fn from(value: TermName) -> Self {
        value.0
    }
}

impl std::ops::Deref for TermName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for TermName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TermName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_name_rejects_blank() {
        assert_eq!(TermName::new(""), Err(EmptyTermName));
        assert_eq!(TermName::new("   \t"), Err(EmptyTermName));
    }

    #[test]
    fn term_name_is_case_sensitive() {
        let lower = TermName::new("greet").unwrap();
        let upper = TermName::new("Greet").unwrap();
        assert_ne!(lower, upper);
        assert_eq!(lower.as_str(), "greet");
    }

    #[test]
    fn term_name_keeps_surrounding_text() {
        let name = TermName::new(" spaced ").unwrap();
        assert_eq!(name.as_str(), " spaced ");
    }

    #[test]
    fn term_name_deserialize_validates() {
        let ok: TermName = serde_json::from_str("\"greet\"").unwrap();
        assert_eq!(ok.to_string(), "greet");

        let err = serde_json::from_str::<TermName>("\"\"").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }
}
