pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Failures opening the index store that callers branch on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Memory database not found at {}. Run `mnemo index` first.", .0.display())]
    NotFound(PathBuf),
    #[error("Memory database schema is version {found}, this build expects {expected}. Run `mnemo index` to upgrade it.")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Open (or create) the index database at the given path with schema initialized.
/// Used by writers.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    let conn = prepare(conn).context("failed to initialize database")?;

    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Open an index database that must already exist, read-only. Used by readers,
/// which report [`StoreError::NotFound`] instead of silently creating an empty
/// store. Nothing is migrated: an older schema is reported as
/// [`StoreError::SchemaMismatch`].
pub fn open_existing(path: impl AsRef<Path>) -> Result<Connection, StoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.busy_timeout(Duration::from_millis(5000))?;

    let found = migrations::get_schema_version(&conn)?;
    if found != migrations::CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            found,
            expected: migrations::CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    prepare(conn).context("failed to initialize database")
}

fn prepare(mut conn: Connection) -> Result<Connection, StoreError> {
    // WAL lets readers (search) proceed while a single writer ingests
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(5000))?;

    schema::init_schema(&conn)?;
    migrations::run_migrations(&mut conn)?;
    Ok(conn)
}
