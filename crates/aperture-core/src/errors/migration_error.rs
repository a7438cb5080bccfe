//! Schema migration errors.
//!
//! Step failures name the step and cause so the caller can retry, roll
//! back, or force. The live store is guaranteed untouched on failure.

use std::path::PathBuf;

/// Errors from the migration manager.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("migration step '{step}' (v{from_version} -> v{to_version}) failed: {message}")]
    StepFailed {
        step: String,
        from_version: u32,
        to_version: u32,
        message: String,
    },

    #[error("store schema v{found} is newer than engine schema v{required}; refusing to touch it")]
    NewerSchema { found: u32, required: u32 },

    #[error("step '{step}' has no reverse operation; rollback refused")]
    Irreversible { step: String },

    #[error("no pre-migration backup found at {path}")]
    BackupMissing { path: PathBuf },

    #[error("IO error during migration: {message}")]
    Io { message: String },

    #[error("SQLite error during migration: {message}")]
    Sqlite { message: String },
}

impl From<super::StorageError> for MigrationError {
    fn from(e: super::StorageError) -> Self {
        MigrationError::Io {
            message: e.to_string(),
        }
    }
}
