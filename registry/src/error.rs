use thiserror::Error;

/// Outcomes of a registry call other than success.
///
/// `NotFound` and `Conflict` are ordinary caller-facing results.
/// `IntegrityViolation` means the storage layer let two rows share a name and
/// is logged where it is detected. `Internal` carries the description of any
/// other storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexiconError {
    #[error("term '{0}' is unknown")]
    NotFound(String),
    /// The name is already defined; `line` is the source line of the existing definition.
    #[error("term already defined: {line}")]
    Conflict { line: String },
    #[error("{rows} rows share the term name '{name}'")]
    IntegrityViolation { name: String, rows: usize },
    #[error("lexicon storage error: {0}")]
    Internal(String),
}

impl LexiconError {
    /// Whether this outcome reflects a fault rather than a caller mistake.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. } | Self::Internal(_))
    }
}
