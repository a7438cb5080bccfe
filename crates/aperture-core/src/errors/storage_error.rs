//! Storage-layer errors for SQLite operations.

/// Errors from the cache store and its connections.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("store IO error: {message}")]
    Io { message: String },

    #[error("store schema is version {found}, engine requires {required}; run migration first")]
    SchemaMismatch { found: u32, required: u32 },

    #[error("backup operation failed: {message}")]
    Backup { message: String },

    #[error("restore operation failed: {message}")]
    Restore { message: String },

    #[error("could not acquire store process lock: {message}")]
    ProcessLock { message: String },
}

impl StorageError {
    /// Wrap a rusqlite error.
    pub fn sqlite(e: impl std::fmt::Display) -> Self {
        StorageError::SqliteError {
            message: e.to_string(),
        }
    }
}
