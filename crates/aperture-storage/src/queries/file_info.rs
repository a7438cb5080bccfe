//! file_info table queries — the prior-run fingerprint snapshot.

use aperture_core::errors::StorageError;
use rusqlite::{params, Connection};

use super::sql_err;

/// One fingerprint snapshot row.
#[derive(Debug, Clone)]
pub struct FileInfoRow {
    pub path: String,
    pub file_size: i64,
    pub content_hash: Option<Vec<u8>>,
    pub mtime_secs: i64,
    pub mtime_nanos: i64,
    pub file_type: Option<String>,
}

/// Load the whole snapshot (for incremental classification).
pub fn load_all(conn: &Connection) -> Result<Vec<FileInfoRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT path, file_size, content_hash, mtime_secs, mtime_nanos, file_type
             FROM file_info",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FileInfoRow {
                path: row.get(0)?,
                file_size: row.get(1)?,
                content_hash: row.get(2)?,
                mtime_secs: row.get(3)?,
                mtime_nanos: row.get(4)?,
                file_type: row.get(5)?,
            })
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Upsert one snapshot row.
pub fn upsert_row(
    conn: &Connection,
    path: &str,
    file_size: i64,
    content_hash: Option<&[u8]>,
    mtime_secs: i64,
    mtime_nanos: i64,
    file_type: &str,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO file_info (path, file_size, content_hash, mtime_secs, mtime_nanos, file_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(path) DO UPDATE SET
            file_size = excluded.file_size,
            content_hash = excluded.content_hash,
            mtime_secs = excluded.mtime_secs,
            mtime_nanos = excluded.mtime_nanos,
            file_type = excluded.file_type",
        params![path, file_size, content_hash, mtime_secs, mtime_nanos, file_type],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Delete one snapshot row. Returns whether a row existed.
pub fn delete_row(conn: &Connection, path: &str) -> Result<bool, StorageError> {
    let n = conn
        .execute("DELETE FROM file_info WHERE path = ?1", params![path])
        .map_err(sql_err)?;
    Ok(n > 0)
}

/// Count snapshot rows.
pub fn count(conn: &Connection) -> Result<u64, StorageError> {
    conn.query_row("SELECT COUNT(*) FROM file_info", [], |row| {
        row.get::<_, i64>(0).map(|n| n as u64)
    })
    .map_err(sql_err)
}
