//! Filesystem preparation for the lexicon database.
//!
//! The database file and its WAL/SHM sidecars are owner-only on Unix (0o600).
//! Directories created for the database are owner-only too; directories that
//! already exist keep their mode, since the path is operator-chosen and may be
//! a home directory or `/`.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs::{self, DirBuilder, OpenOptions};
use std::path::Path;

/// Create missing parent directories and the database file with restricted
/// permissions, then open a connection.
pub(crate) fn open_secure_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_missing_dir(parent)?;
    }
    prepare_db_file(path)?;

    let db = Connection::open(path)
        .with_context(|| format!("Failed to open lexicon database at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Opened lexicon database");
    Ok(db)
}

fn create_missing_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), "Created database directory");
    Ok(())
}

fn prepare_db_file(path: &Path) -> Result<()> {
    if !path.exists() {
        let mut options = OpenOptions::new();
        options.create(true).truncate(false).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
            .open(path)
            .with_context(|| format!("Failed to create database file: {}", path.display()))?;
    }

    #[cfg(unix)]
    restrict_to_owner(path)?;
    Ok(())
}

/// Tighten the database file, and any WAL/SHM left by a previous run, to 0o600.
#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let owner_only = || fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, owner_only())
        .with_context(|| format!("Failed to set database permissions: {}", path.display()))?;

    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = Path::new(&sidecar);
        if !sidecar.exists() {
            continue;
        }
        // SQLite gives new sidecars the main file's mode.
        if let Err(e) = fs::set_permissions(sidecar, owner_only()) {
            tracing::debug!(
                path = %sidecar.display(),
                error = %e,
                "Could not restrict database sidecar"
            );
        }
    }
    Ok(())
}
