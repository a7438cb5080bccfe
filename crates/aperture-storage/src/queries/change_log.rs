//! change_log table queries — one row per path per run, consumed by
//! external reporting.

use aperture_core::errors::StorageError;
use aperture_core::types::ChangeKind;
use rusqlite::{params, Connection};

use super::{now_secs, sql_err};

/// One change row as external reporting sees it.
#[derive(Debug, Clone)]
pub struct ChangeLogRow {
    pub run_id: i64,
    pub path: String,
    pub change_type: String,
    pub recorded_at: i64,
}

/// Append one change row.
pub fn insert(
    conn: &Connection,
    run_id: i64,
    path: &str,
    kind: ChangeKind,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO change_log (run_id, path, change_type, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![run_id, path, kind.as_str(), now_secs()],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// All change rows for a run, ordered by path.
pub fn for_run(conn: &Connection, run_id: i64) -> Result<Vec<ChangeLogRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT run_id, path, change_type, recorded_at
             FROM change_log WHERE run_id = ?1 ORDER BY path",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![run_id], |row| {
            Ok(ChangeLogRow {
                run_id: row.get(0)?,
                path: row.get(1)?,
                change_type: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Drop change rows older than the newest `keep_runs` runs. The table is
/// a per-run projection, not an archive.
pub fn prune_old_runs(conn: &Connection, keep_runs: u32) -> Result<u64, StorageError> {
    let n = conn
        .execute(
            "DELETE FROM change_log WHERE run_id NOT IN (
                 SELECT id FROM run_history ORDER BY started_at DESC LIMIT ?1
             )",
            params![keep_runs],
        )
        .map_err(sql_err)?;
    Ok(n as u64)
}
