//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating the database directory.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The connection string names something other than SQLite.
    #[error("Unsupported database URL '{0}': only sqlite is supported")]
    UnsupportedUrl(String),

    /// A server database such as PostgreSQL. The job store is a local SQLite
    /// file shared by the API and worker processes of one host.
    #[error(
        "Database engine '{scheme}' is not supported; use sqlite://<path> shared by the API and workers on one host"
    )]
    UnsupportedEngine { scheme: String },

    /// A stored row could not be mapped to a domain value.
    #[error("Corrupt row for '{id}': {reason}")]
    CorruptRow { id: String, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A blocking database task was cancelled or panicked.
    #[error("Database task failed: {0}")]
    Task(String),
}
