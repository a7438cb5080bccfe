//! metadata table queries — one row of opaque extracted metadata per path.

use aperture_core::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};

use super::{now_secs, sql_err};

/// A cache entry row joined with its stored fingerprint from file_info.
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub path: String,
    pub content_hash: Option<Vec<u8>>,
    pub metadata_blob: Vec<u8>,
    pub schema_version: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub file_size: Option<i64>,
    pub mtime_secs: Option<i64>,
    pub mtime_nanos: Option<i64>,
}

/// Upsert a cache entry. `created_at` is preserved across overwrites;
/// `updated_at` always moves forward.
pub fn upsert_entry(
    conn: &Connection,
    path: &str,
    content_hash: Option<&[u8]>,
    metadata_blob: &[u8],
    schema_version: u32,
) -> Result<(), StorageError> {
    let now = now_secs();
    conn.execute(
        "INSERT INTO metadata (path, content_hash, metadata_blob, schema_version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(path) DO UPDATE SET
            content_hash = excluded.content_hash,
            metadata_blob = excluded.metadata_blob,
            schema_version = excluded.schema_version,
            updated_at = excluded.updated_at",
        params![path, content_hash, metadata_blob, schema_version, now],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Fetch a cache entry with its stored fingerprint (left join: a pruned
/// snapshot row leaves the fingerprint columns NULL).
pub fn get_entry(conn: &Connection, path: &str) -> Result<Option<MetadataRow>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT m.path, m.content_hash, m.metadata_blob, m.schema_version,
                    m.created_at, m.updated_at,
                    f.file_size, f.mtime_secs, f.mtime_nanos
             FROM metadata m
             LEFT JOIN file_info f ON f.path = m.path
             WHERE m.path = ?1",
        )
        .map_err(sql_err)?;

    stmt.query_row(params![path], |row| {
        Ok(MetadataRow {
            path: row.get(0)?,
            content_hash: row.get(1)?,
            metadata_blob: row.get(2)?,
            schema_version: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            file_size: row.get(6)?,
            mtime_secs: row.get(7)?,
            mtime_nanos: row.get(8)?,
        })
    })
    .optional()
    .map_err(sql_err)
}

/// Delete a cache entry. Returns whether a row existed.
pub fn delete_entry(conn: &Connection, path: &str) -> Result<bool, StorageError> {
    let n = conn
        .execute("DELETE FROM metadata WHERE path = ?1", params![path])
        .map_err(sql_err)?;
    Ok(n > 0)
}

/// Entry count and total metadata bytes.
pub fn count_and_bytes(conn: &Connection) -> Result<(u64, u64), StorageError> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(LENGTH(metadata_blob)), 0) FROM metadata",
        [],
        |row| {
            let count: i64 = row.get(0)?;
            let bytes: i64 = row.get(1)?;
            Ok((count as u64, bytes as u64))
        },
    )
    .map_err(sql_err)
}

/// All entry paths with their hashes, ordered by path. Used by tests and
/// external reporting to compare store contents.
pub fn all_entries(conn: &Connection) -> Result<Vec<(String, Option<Vec<u8>>)>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT path, content_hash FROM metadata ORDER BY path")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Candidate rows for eviction: path, blob bytes, last update. Ordered
/// least-recently-updated first; `smart_ties` additionally breaks ties by
/// larger blob first so one eviction frees the most space.
pub fn eviction_candidates(
    conn: &Connection,
    smart_ties: bool,
) -> Result<Vec<(String, u64, i64)>, StorageError> {
    let sql = if smart_ties {
        "SELECT path, LENGTH(metadata_blob), updated_at FROM metadata
         ORDER BY updated_at ASC, LENGTH(metadata_blob) DESC, path ASC"
    } else {
        "SELECT path, LENGTH(metadata_blob), updated_at FROM metadata
         ORDER BY updated_at ASC, path ASC"
    };
    let mut stmt = conn.prepare_cached(sql).map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| {
            let path: String = row.get(0)?;
            let bytes: i64 = row.get(1)?;
            let updated_at: i64 = row.get(2)?;
            Ok((path, bytes as u64, updated_at))
        })
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Delete every entry last updated strictly before `cutoff_secs`.
/// Returns (evicted count, reclaimed bytes).
pub fn delete_older_than(conn: &Connection, cutoff_secs: i64) -> Result<(u64, u64), StorageError> {
    let reclaimed: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(LENGTH(metadata_blob)), 0) FROM metadata WHERE updated_at < ?1",
            params![cutoff_secs],
            |row| row.get(0),
        )
        .map_err(sql_err)?;
    let evicted = conn
        .execute("DELETE FROM metadata WHERE updated_at < ?1", params![cutoff_secs])
        .map_err(sql_err)?;
    Ok((evicted as u64, reclaimed as u64))
}

/// Delete all entries. Returns the number removed.
pub fn clear(conn: &Connection) -> Result<u64, StorageError> {
    let n = conn.execute("DELETE FROM metadata", []).map_err(sql_err)?;
    Ok(n as u64)
}
