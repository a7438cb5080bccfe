//! Write connection utilities — BEGIN IMMEDIATE transactions.

use aperture_core::errors::StorageError;
use rusqlite::Connection;

/// Execute a write operation inside a BEGIN IMMEDIATE transaction.
///
/// The transaction is the cache store's staging slot: the row only becomes
/// visible on commit, and a crash or I/O failure mid-write rolls back to
/// the previous row. IMMEDIATE acquires the write lock at transaction
/// start, preventing SQLITE_BUSY upgrades mid-transaction.
pub fn with_immediate_transaction<F, T>(conn: &Connection, f: F) -> Result<T, StorageError>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StorageError>,
{
    // new_unchecked issues a single `BEGIN IMMEDIATE` and returns a
    // Transaction handle whose default drop behavior is rollback; dropping
    // it without commit rolls back. IMMEDIATE acquires the write lock at
    // transaction start, preventing SQLITE_BUSY upgrades mid-transaction.
    let tx = rusqlite::Transaction::new_unchecked(conn, rusqlite::TransactionBehavior::Immediate)
        .map_err(|e| StorageError::SqliteError {
            message: format!("failed to begin immediate transaction: {e}"),
        })?;

    let result = f(&tx)?;

    tx.commit().map_err(|e| StorageError::SqliteError {
        message: format!("failed to commit: {e}"),
    })?;

    Ok(result)
}
