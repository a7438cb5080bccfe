//! Whole-store snapshot and replacement via the SQLite online backup API.
//!
//! A backup produced here is a byte-equivalent, restorable copy of the
//! store even when taken from a live WAL database (the backup API reads a
//! consistent snapshot; a plain file copy would race the WAL).

use std::path::{Path, PathBuf};
use std::time::Duration;

use aperture_core::errors::StorageError;
use rusqlite::Connection;

/// Copy the store at `src_db` to `dest` as a consistent snapshot.
pub fn snapshot_file(src_db: &Path, dest: &Path) -> Result<(), StorageError> {
    let src = Connection::open_with_flags(
        src_db,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .map_err(|e| StorageError::Backup {
        message: format!("open backup source {}: {e}", src_db.display()),
    })?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::Backup {
            message: format!("create backup dir: {e}"),
        })?;
    }
    let mut dst = Connection::open(dest).map_err(|e| StorageError::Backup {
        message: format!("open backup dest {}: {e}", dest.display()),
    })?;
    run_backup(&src, &mut dst)
}

/// Back up an open connection to the given path.
pub fn create_backup(conn: &Connection, backup_path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = backup_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::Backup {
            message: format!("create backup dir: {e}"),
        })?;
    }
    let mut dst = Connection::open(backup_path).map_err(|e| StorageError::Backup {
        message: format!("open backup dest: {e}"),
    })?;
    run_backup(conn, &mut dst)
}

/// Restore a store from a backup file, replacing the contents behind an
/// open connection. The source must exist and be a readable database;
/// failure leaves the live store unaffected.
pub fn restore_from_backup(conn: &mut Connection, backup_path: &Path) -> Result<(), StorageError> {
    if !backup_path.exists() {
        return Err(StorageError::Restore {
            message: format!("backup file not found: {}", backup_path.display()),
        });
    }
    let src = Connection::open_with_flags(
        backup_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .map_err(|e| StorageError::Restore {
        message: format!("open backup source: {e}"),
    })?;

    let backup = rusqlite::backup::Backup::new(&src, conn).map_err(|e| StorageError::Restore {
        message: format!("init restore: {e}"),
    })?;
    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(|e| StorageError::Restore {
            message: format!("run restore: {e}"),
        })?;
    Ok(())
}

fn run_backup(src: &Connection, dst: &mut Connection) -> Result<(), StorageError> {
    let backup = rusqlite::backup::Backup::new(src, dst).map_err(|e| StorageError::Backup {
        message: format!("init backup: {e}"),
    })?;
    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(|e| StorageError::Backup {
            message: format!("run backup: {e}"),
        })?;
    Ok(())
}

/// Delete the oldest operational backups in `dir` beyond `max_keep`.
/// Backups are named `aperture-<started_at>.db`, so lexical order is
/// chronological.
pub fn rotate_operational(dir: &Path, max_keep: u32) -> Result<Vec<PathBuf>, StorageError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| StorageError::Backup {
            message: format!("read backup dir: {e}"),
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("aperture-") && n.ends_with(".db"))
        })
        .collect();
    backups.sort();

    let mut removed = Vec::new();
    while backups.len() > max_keep as usize {
        let victim = backups.remove(0);
        std::fs::remove_file(&victim).map_err(|e| StorageError::Backup {
            message: format!("remove {}: {e}", victim.display()),
        })?;
        tracing::debug!(path = %victim.display(), "rotated old backup");
        removed.push(victim);
    }
    Ok(removed)
}
