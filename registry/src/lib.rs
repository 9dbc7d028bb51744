//! Term registry: name resolution and insert-only registration.
//!
//! This crate provides:
//! - The [`TermStore`] seam over durable storage
//! - [`SqliteTermStore`], the SQLite implementation with a UNIQUE `Name` column
//! - [`Lexicon`], the registry enforcing resolve/assign semantics
//!
//! # Architecture
//!
//! ```text
//! Lexicon<S: TermStore>
//! ├── resolve(name)      -> TermRecord | NotFound | IntegrityViolation
//! ├── resolve_doc(name)  -> TermDoc    | NotFound | IntegrityViolation
//! └── assign(definition) -> Ack        | Conflict(line) | Internal
//!
//! SqliteTermStore (one connection, statement-scoped lock)
//! └── Term table (Name UNIQUE)
//! ```
//!
//! Uniqueness lives in the storage layer. `assign` issues a single insert and
//! only reads back when the store reports a unique violation.

mod error;
mod registry;
mod sqlite_store;
mod sqlite_util;
mod store;

pub use error::LexiconError;
pub use registry::Lexicon;
pub use sqlite_store::SqliteTermStore;
pub use store::{NewTerm, StoreError, TermRow, TermStore};
