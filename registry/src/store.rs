//! Storage seam for the registry.
//!
//! A store owns the durable `Term` table. It must provide an atomic
//! unique insert; the registry never checks for an existing row before writing.

use thiserror::Error;

/// A normalized row ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm<'a> {
    pub name: &'a str,
    pub params: &'a str,
    pub param_count: u32,
    pub definition: &'a str,
    pub line: &'a str,
    pub creator: Option<&'a str>,
    pub ip_addr: Option<&'a str>,
    pub doc: Option<&'a str>,
}

/// The columns read back by `resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRow {
    pub params: String,
    pub definition: String,
    pub line: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The insert collided with an existing row of the same name.
    #[error("a term with this name already exists")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Durable storage for terms.
///
/// Lookups return every row matching the exact name so the caller can tell
/// "none" from "more than one".
pub trait TermStore: Send + Sync {
    /// Insert a row, failing with [`StoreError::UniqueViolation`] if the name exists.
    fn insert(&self, term: &NewTerm<'_>) -> Result<(), StoreError>;

    fn rows_for(&self, name: &str) -> Result<Vec<TermRow>, StoreError>;

    fn docs_for(&self, name: &str) -> Result<Vec<Option<String>>, StoreError>;
}
