//! Per-table query modules.
//!
//! Every statement uses `params![]` placeholders; file paths are never
//! interpolated into SQL text. Callers hold the right connection (reads
//! through the pool, writes through the serialized writer) — these
//! functions only shape rows.

pub mod change_log;
pub mod file_info;
pub mod metadata;
pub mod run_history;
pub mod store_meta;

use aperture_core::errors::StorageError;

pub(crate) fn sql_err(e: rusqlite::Error) -> StorageError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
}

/// Current wall-clock time as UNIX seconds.
pub(crate) fn now_secs() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}
