//! run_history table queries — append-only log of runs.

use aperture_core::errors::StorageError;
use aperture_core::types::RunSummary;
use rusqlite::{params, Connection};

use super::sql_err;

/// A run history record.
#[derive(Debug, Clone)]
pub struct RunHistoryRow {
    pub id: i64,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub root_path: String,
    pub total_files: Option<i64>,
    pub new_files: Option<i64>,
    pub modified_files: Option<i64>,
    pub deleted_files: Option<i64>,
    pub unchanged_files: Option<i64>,
    pub cache_hits: Option<i64>,
    pub skipped: Option<i64>,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub error: Option<String>,
}

/// Insert a new run record (status = 'running'). Returns the row id.
pub fn insert_run_start(
    conn: &Connection,
    started_at: i64,
    root_path: &str,
) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO run_history (started_at, root_path, status) VALUES (?1, ?2, 'running')",
        params![started_at, root_path],
    )
    .map_err(sql_err)?;
    Ok(conn.last_insert_rowid())
}

/// Update a run record with completion data from the run summary.
pub fn update_run_complete(
    conn: &Connection,
    id: i64,
    completed_at: i64,
    summary: &RunSummary,
    status: &str,
    error: Option<&str>,
) -> Result<(), StorageError> {
    let total = summary.new
        + summary.modified
        + summary.content_changed
        + summary.unchanged
        + summary.skipped;
    conn.execute(
        "UPDATE run_history SET
            completed_at = ?1, total_files = ?2, new_files = ?3,
            modified_files = ?4, deleted_files = ?5, unchanged_files = ?6,
            cache_hits = ?7, skipped = ?8, duration_ms = ?9, status = ?10, error = ?11
         WHERE id = ?12",
        params![
            completed_at,
            total as i64,
            summary.new as i64,
            (summary.modified + summary.content_changed) as i64,
            summary.deleted as i64,
            summary.unchanged as i64,
            summary.cache_hits as i64,
            summary.skipped as i64,
            summary.duration_ms as i64,
            status,
            error,
            id
        ],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Mark a run as fatally aborted. Best-effort bookkeeping on the way out
/// of a failed run; counts stay NULL.
pub fn mark_run_fatal(
    conn: &Connection,
    id: i64,
    completed_at: i64,
    error: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE run_history SET completed_at = ?1, status = 'fatal', error = ?2 WHERE id = ?3",
        params![completed_at, error, id],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Query recent runs, newest first.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<RunHistoryRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, started_at, completed_at, root_path, total_files, new_files,
                    modified_files, deleted_files, unchanged_files, cache_hits,
                    skipped, duration_ms, status, error
             FROM run_history ORDER BY started_at DESC, id DESC LIMIT ?1",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(RunHistoryRow {
                id: row.get(0)?,
                started_at: row.get(1)?,
                completed_at: row.get(2)?,
                root_path: row.get(3)?,
                total_files: row.get(4)?,
                new_files: row.get(5)?,
                modified_files: row.get(6)?,
                deleted_files: row.get(7)?,
                unchanged_files: row.get(8)?,
                cache_hits: row.get(9)?,
                skipped: row.get(10)?,
                duration_ms: row.get(11)?,
                status: row.get(12)?,
                error: row.get(13)?,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}
