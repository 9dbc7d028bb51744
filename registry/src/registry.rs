//! The lexicon registry.
//!
//! Terms move `Unknown -> Defined` exactly once. There is no update and no
//! delete; a second assignment of a defined name is a conflict and leaves the
//! stored row untouched.

use lexicon_types::{
    Ack, EncodedParams, TermDefinition, TermDoc, TermName, TermRecord, decode_definition,
    decode_params,
};

use crate::error::LexiconError;
use crate::sqlite_store::SqliteTermStore;
use crate::store::{NewTerm, StoreError, TermStore};

/// Registry over an explicitly supplied store.
///
/// Every call makes one storage round trip, except a conflicting `assign`
/// which makes a second one to report where the name was first defined.
pub struct Lexicon<S = SqliteTermStore> {
    store: S,
}

impl<S: TermStore> Lexicon<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Look up a term by exact name.
    pub fn resolve(&self, name: &TermName) -> Result<TermRecord, LexiconError> {
        let rows = self.store.rows_for(name).map_err(|e| internal(name, e))?;
        let row = single(name, rows)?;

        Ok(TermRecord {
            name: name.to_string(),
            params: decode_params(&row.params),
            definition: decode_definition(&row.definition),
            line: row.line,
        })
    }

    /// Look up only a term's documentation.
    pub fn resolve_doc(&self, name: &TermName) -> Result<TermDoc, LexiconError> {
        let docs = self.store.docs_for(name).map_err(|e| internal(name, e))?;
        let doc = single(name, docs)?;

        Ok(TermDoc {
            doc: doc.unwrap_or_default(),
        })
    }

    /// Register a new term. Insert-only: an existing name is never overwritten.
    pub fn assign(&self, term: &TermDefinition) -> Result<Ack, LexiconError> {
        let params = EncodedParams::encode(term.params.as_ref());
        let row = NewTerm {
            name: term.name.as_str(),
            params: params.as_str(),
            param_count: params.count(),
            definition: &term.definition,
            line: &term.line,
            creator: term.creator.as_deref(),
            ip_addr: term.ip_addr.as_deref(),
            doc: term.doc.as_deref(),
        };

        match self.store.insert(&row) {
            Ok(()) => {
                tracing::debug!(
                    term = %term.name,
                    params = params.count(),
                    creator = term.creator.as_deref().unwrap_or(""),
                    "Assigned term"
                );
                Ok(Ack::COMPLETE)
            }
            Err(StoreError::UniqueViolation) => Err(self.existing_definition(&term.name)),
            Err(err) => Err(internal(&term.name, err)),
        }
    }

    /// Compensating read after a rejected insert: re-resolve and report the
    /// stored line. Rows going missing or multiplying are faults, not conflicts.
    fn existing_definition(&self, name: &TermName) -> LexiconError {
        let rows = match self.store.rows_for(name) {
            Ok(rows) => rows,
            Err(err) => return internal(name, err),
        };

        match single(name, rows) {
            Ok(existing) => {
                tracing::debug!(term = %name, "Rejected duplicate assignment");
                LexiconError::Conflict {
                    line: existing.line,
                }
            }
            Err(LexiconError::NotFound(_)) => {
                tracing::error!(
                    term = %name,
                    "Insert reported a duplicate name but no existing row was found"
                );
                LexiconError::Internal(format!(
                    "term '{name}' was rejected as a duplicate but is not stored"
                ))
            }
            Err(err) => err,
        }
    }
}

/// Exactly one row is a hit, none is unknown, more is a broken invariant.
fn single<T>(name: &TermName, mut rows: Vec<T>) -> Result<T, LexiconError> {
    match rows.len() {
        0 => Err(LexiconError::NotFound(name.to_string())),
        1 => rows
            .pop()
            .ok_or_else(|| LexiconError::NotFound(name.to_string())),
        count => {
            tracing::error!(term = %name, rows = count, "Term name is not unique in storage");
            Err(LexiconError::IntegrityViolation {
                name: name.to_string(),
                rows: count,
            })
        }
    }
}

fn internal(name: &TermName, err: StoreError) -> LexiconError {
    let detail = format!("{err:#}");
    tracing::error!(term = %name, error = %detail, "Lexicon storage failure");
    LexiconError::Internal(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TermRow;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::Mutex;

    fn name(s: &str) -> TermName {
        TermName::new(s).unwrap()
    }

    fn lexicon() -> Lexicon {
        Lexicon::new(SqliteTermStore::open_in_memory().unwrap())
    }

    /// Store double whose lookups return canned rows regardless of name.
    #[derive(Default)]
    struct CannedStore {
        rows: Vec<TermRow>,
        docs: Vec<Option<String>>,
        insert_error: Mutex<Option<StoreError>>,
        lookup_fails: bool,
    }

    impl TermStore for CannedStore {
        fn insert(&self, _term: &NewTerm<'_>) -> Result<(), StoreError> {
            match self.insert_error.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn rows_for(&self, _name: &str) -> Result<Vec<TermRow>, StoreError> {
            if self.lookup_fails {
                return Err(StoreError::Other(anyhow!("disk I/O error")));
            }
            Ok(self.rows.clone())
        }

        fn docs_for(&self, _name: &str) -> Result<Vec<Option<String>>, StoreError> {
            Ok(self.docs.clone())
        }
    }

    fn row(line: &str) -> TermRow {
        TermRow {
            params: "null".to_string(),
            definition: "1".to_string(),
            line: line.to_string(),
        }
    }

    #[test]
    fn unknown_name_is_not_found() {
        let lex = lexicon();
        assert_eq!(
            lex.resolve(&name("nope")),
            Err(LexiconError::NotFound("nope".to_string()))
        );
        assert_eq!(
            lex.resolve_doc(&name("nope")),
            Err(LexiconError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn greet_example() {
        let lex = lexicon();
        let greet = TermDefinition::new(name("greet"), "\"hello\"", "greet() -> hello");

        assert_eq!(lex.assign(&greet), Ok(Ack::COMPLETE));
        assert_eq!(
            lex.resolve(&name("greet")).unwrap(),
            TermRecord {
                name: "greet".to_string(),
                params: vec![],
                definition: json!("hello"),
                line: "greet() -> hello".to_string(),
            }
        );

        let again = TermDefinition::new(name("greet"), "\"bye\"", "greet() -> bye");
        assert_eq!(
            lex.assign(&again),
            Err(LexiconError::Conflict {
                line: "greet() -> hello".to_string()
            })
        );
        assert_eq!(lex.resolve(&name("greet")).unwrap().definition, json!("hello"));
    }

    #[test]
    fn text_params_round_trip() {
        let lex = lexicon();
        let add = TermDefinition::new(name("add3"), "(+ a b c)", "add3(a,b,c)").with_params("a,b,c");
        lex.assign(&add).unwrap();

        let record = lex.resolve(&name("add3")).unwrap();
        assert_eq!(record.params, vec!["a", "b", "c"]);
        assert_eq!(record.definition, json!("(+ a b c)"));
    }

    #[test]
    fn list_params_round_trip() {
        let lex = lexicon();
        let pair = TermDefinition::new(name("pair"), "[1,2]", "pair(x, y)")
            .with_params(vec!["x".to_string(), "y".to_string()]);
        lex.assign(&pair).unwrap();

        let record = lex.resolve(&name("pair")).unwrap();
        assert_eq!(record.params, vec!["x", "y"]);
        assert_eq!(record.definition, json!([1, 2]));
    }

    #[test]
    fn empty_list_text_resolves_to_no_params() {
        let lex = lexicon();
        lex.assign(&TermDefinition::new(name("nil"), "0", "nil()").with_params("[]"))
            .unwrap();
        assert!(lex.resolve(&name("nil")).unwrap().params.is_empty());
    }

    #[test]
    fn resolve_doc_returns_doc_or_empty() {
        let lex = lexicon();
        lex.assign(&TermDefinition::new(name("bare"), "1", "bare").with_creator("tests"))
            .unwrap();
        lex.assign(&TermDefinition::new(name("docd"), "2", "docd").with_doc("Two."))
            .unwrap();

        assert_eq!(lex.resolve_doc(&name("bare")).unwrap().doc, "");
        assert_eq!(lex.resolve_doc(&name("docd")).unwrap().doc, "Two.");
    }

    #[test]
    fn duplicate_rows_are_integrity_violation() {
        let lex = Lexicon::new(CannedStore {
            rows: vec![row("a"), row("b")],
            docs: vec![None, Some("x".to_string())],
            ..Default::default()
        });

        let expected = LexiconError::IntegrityViolation {
            name: "dup".to_string(),
            rows: 2,
        };
        assert_eq!(lex.resolve(&name("dup")), Err(expected.clone()));
        assert_eq!(lex.resolve_doc(&name("dup")), Err(expected));
    }

    #[test]
    fn conflict_without_existing_row_is_internal() {
        let lex = Lexicon::new(CannedStore {
            insert_error: Mutex::new(Some(StoreError::UniqueViolation)),
            ..Default::default()
        });

        let err = lex
            .assign(&TermDefinition::new(name("ghost"), "1", "ghost"))
            .unwrap_err();
        assert!(matches!(err, LexiconError::Internal(_)));
        assert!(err.is_server_fault());
    }

    #[test]
    fn conflict_reports_first_stored_line() {
        let lex = Lexicon::new(CannedStore {
            rows: vec![row("first()")],
            insert_error: Mutex::new(Some(StoreError::UniqueViolation)),
            ..Default::default()
        });

        assert_eq!(
            lex.assign(&TermDefinition::new(name("first"), "1", "second()")),
            Err(LexiconError::Conflict {
                line: "first()".to_string()
            })
        );
    }

    #[test]
    fn conflict_over_duplicate_rows_is_integrity_violation() {
        let lex = Lexicon::new(CannedStore {
            rows: vec![row("first()"), row("second()")],
            insert_error: Mutex::new(Some(StoreError::UniqueViolation)),
            ..Default::default()
        });

        assert_eq!(
            lex.assign(&TermDefinition::new(name("twice"), "1", "third()")),
            Err(LexiconError::IntegrityViolation {
                name: "twice".to_string(),
                rows: 2,
            })
        );
    }

    #[test]
    fn storage_failure_is_internal_with_description() {
        let lex = Lexicon::new(CannedStore {
            insert_error: Mutex::new(Some(StoreError::Other(anyhow!("database is locked")))),
            lookup_fails: true,
            ..Default::default()
        });

        let err = lex
            .assign(&TermDefinition::new(name("t"), "1", "t"))
            .unwrap_err();
        assert_eq!(err, LexiconError::Internal("database is locked".to_string()));

        let err = lex.resolve(&name("t")).unwrap_err();
        assert_eq!(err, LexiconError::Internal("disk I/O error".to_string()));
    }

    #[test]
    fn conflict_whose_readback_fails_is_internal() {
        let lex = Lexicon::new(CannedStore {
            insert_error: Mutex::new(Some(StoreError::UniqueViolation)),
            lookup_fails: true,
            ..Default::default()
        });

        assert!(matches!(
            lex.assign(&TermDefinition::new(name("t"), "1", "t")),
            Err(LexiconError::Internal(_))
        ));
    }
}
