//! store_meta table queries — store-level key/value state.

use aperture_core::errors::StorageError;
use rusqlite::{params, Connection, OptionalExtension};

use super::sql_err;

/// Keys the engine reads and writes.
pub const KEY_VERSION: &str = "version";
pub const KEY_CREATED_AT: &str = "created_at";
pub const KEY_SIZE_LIMIT: &str = "size_limit";
pub const KEY_COMPRESSION: &str = "compression";

/// Read one meta value.
pub fn get(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT value FROM store_meta WHERE key = ?1")
        .map_err(sql_err)?;
    stmt.query_row(params![key], |row| row.get(0))
        .optional()
        .map_err(sql_err)
}

/// Write one meta value (insert or overwrite).
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(sql_err)?;
    Ok(())
}

/// Read all meta rows, ordered by key.
pub fn all(conn: &Connection) -> Result<Vec<(String, String)>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT key, value FROM store_meta ORDER BY key")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}
