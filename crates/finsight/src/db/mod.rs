//! Database module for persistent job storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

/// Default connection string when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./financial.db";

/// Where the SQLite database lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl DatabaseLocation {
    /// Parses `sqlite://<path>`, `sqlite:///<abs path>`, `sqlite::memory:`
    /// or a bare filesystem path.
    pub fn parse(url: &str) -> Result<Self, DatabaseError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DatabaseError::UnsupportedUrl(url.to_string()));
        }

        if url == "sqlite::memory:" || url == "sqlite://:memory:" || url == ":memory:" {
            return Ok(Self::Memory);
        }

        if let Some(rest) = url.strip_prefix("sqlite://") {
            // Connection-string options (`?mode=rwc`) have no meaning for rusqlite.
            let path = rest.split('?').next().unwrap_or(rest);
            if path.is_empty() {
                return Err(DatabaseError::UnsupportedUrl(url.to_string()));
            }
            return Ok(Self::File(PathBuf::from(path)));
        }

        if let Some(rest) = url.strip_prefix("sqlite:") {
            if !rest.is_empty() {
                return Ok(Self::File(PathBuf::from(rest)));
            }
        }

        if let Some((scheme, _)) = url.split_once("://") {
            return Err(DatabaseError::UnsupportedEngine {
                scheme: scheme.to_string(),
            });
        }

        Ok(Self::File(PathBuf::from(url)))
    }
}

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database described by a connection string.
    pub fn connect(url: &str) -> Result<Self, DatabaseError> {
        match DatabaseLocation::parse(url)? {
            DatabaseLocation::File(path) => Self::open(&path),
            DatabaseLocation::Memory => Self::open_in_memory(),
        }
    }

    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        migrations::run_all(&conn)?;

        log::info!(
            "Database opened at {}",
            crate::sanitize::redact_path(path)
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}
