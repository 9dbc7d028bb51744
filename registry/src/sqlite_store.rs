//! SQLite-backed term store.
//!
//! One `Term` table keyed by a unique index on `Name`. Databases written by
//! earlier revisions of the service are upgraded in place by adding the
//! columns they lack; nothing is ever rewritten.

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, ErrorCode, ffi, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::sqlite_util::open_secure_db;
use crate::store::{NewTerm, StoreError, TermRow, TermStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns added after the first revision of the table, with the declaration
/// used when upgrading an older database.
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("Params", "TEXT NOT NULL DEFAULT 'null'"),
    ("ParamNum", "INTEGER NOT NULL DEFAULT 0"),
    ("Line", "TEXT NOT NULL DEFAULT ''"),
    ("Creator", "TEXT"),
    ("IPAddr", "TEXT"),
    ("Doc", "TEXT"),
];

/// Term store over a single SQLite connection.
///
/// The connection lock is taken per statement and released before returning,
/// so callers never hold it across a suspension point.
pub struct SqliteTermStore {
    db: Mutex<Connection>,
}

impl SqliteTermStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS Term (
            Name TEXT NOT NULL,
            Params TEXT NOT NULL DEFAULT 'null',
            ParamNum INTEGER NOT NULL DEFAULT 0,
            Definition TEXT NOT NULL,
            Line TEXT NOT NULL DEFAULT '',
            Creator TEXT,
            IPAddr TEXT,
            Doc TEXT
        );
    ";

    const UNIQUE_NAME_INDEX: &'static str =
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_term_name ON Term(Name)";

    /// Open or create the lexicon database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = open_secure_db(path)?;
        let store = Self::initialize(db)?;
        tracing::info!(
            path = %path.display(),
            terms = store.term_count()?,
            "Lexicon store ready"
        );
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory lexicon")?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .context("Failed to set lexicon pragmas")?;
        db.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set lexicon busy timeout")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create lexicon schema")?;
        ensure_additive_columns(&db)?;
        ensure_unique_names(&db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Number of stored terms.
    pub fn term_count(&self) -> Result<u64> {
        let db = self.lock()?;
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM Term", [], |row| row.get(0))
            .context("Failed to count terms")?;
        Ok(count as u64)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow!("lexicon database lock poisoned"))
    }
}

impl TermStore for SqliteTermStore {
    fn insert(&self, term: &NewTerm<'_>) -> Result<(), StoreError> {
        let db = self.lock()?;
        let inserted = db.execute(
            "INSERT INTO Term (Name, Params, ParamNum, Definition, Line, Creator, IPAddr, Doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                term.name,
                term.params,
                i64::from(term.param_count),
                term.definition,
                term.line,
                term.creator,
                term.ip_addr,
                term.doc,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::UniqueViolation),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("Failed to insert term '{}'", term.name))
                .into()),
        }
    }

    fn rows_for(&self, name: &str) -> Result<Vec<TermRow>, StoreError> {
        let db = self.lock()?;
        let mut stmt = db
            .prepare_cached("SELECT Params, Definition, Line FROM Term WHERE Name = ?1")
            .context("Failed to prepare term lookup")?;

        let rows = stmt
            .query_map([name], |row| {
                Ok(TermRow {
                    params: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    definition: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    line: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })
            .context("Failed to query term")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read term row")?;

        Ok(rows)
    }

    fn docs_for(&self, name: &str) -> Result<Vec<Option<String>>, StoreError> {
        let db = self.lock()?;
        let mut stmt = db
            .prepare_cached("SELECT Doc FROM Term WHERE Name = ?1")
            .context("Failed to prepare doc lookup")?;

        let docs = stmt
            .query_map([name], |row| row.get::<_, Option<String>>(0))
            .context("Failed to query term doc")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read term doc")?;

        Ok(docs)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error().is_some_and(|e| {
        e.code == ErrorCode::ConstraintViolation
            && matches!(
                e.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            )
    })
}

/// Migration: add columns introduced after a database was first created.
fn ensure_additive_columns(db: &Connection) -> Result<()> {
    let existing = term_columns(db)?;
    for (column, decl) in ADDITIVE_COLUMNS {
        if existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            continue;
        }
        db.execute(&format!("ALTER TABLE Term ADD COLUMN {column} {decl}"), [])
            .with_context(|| format!("Failed to add {column} column to Term"))?;
        tracing::info!(column, "Upgraded lexicon schema");
    }
    Ok(())
}

fn term_columns(db: &Connection) -> Result<Vec<String>> {
    let mut stmt = db
        .prepare("PRAGMA table_info(Term)")
        .context("Failed to inspect Term schema")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context("Failed to query Term columns")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read Term columns")?;
    Ok(columns)
}

/// Uniqueness is the storage layer's job. A legacy table that already holds
/// duplicate names cannot be indexed, and is refused rather than served.
fn ensure_unique_names(db: &Connection) -> Result<()> {
    let duplicates: i64 = db
        .query_row(
            "SELECT COUNT(*) FROM (SELECT Name FROM Term GROUP BY Name HAVING COUNT(*) > 1)",
            [],
            |row| row.get(0),
        )
        .context("Failed to check Term for duplicate names")?;
    if duplicates > 0 {
        tracing::error!(duplicates, "Term table holds duplicate names");
        bail!("Term table holds {duplicates} duplicated name(s); cannot enforce uniqueness");
    }

    db.execute_batch(SqliteTermStore::UNIQUE_NAME_INDEX)
        .context("Failed to create unique index on Term(Name)")?;
    Ok(())
}
