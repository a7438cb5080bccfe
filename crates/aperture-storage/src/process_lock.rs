//! Advisory process lock on the store.
//!
//! Migrations, backup, and restore rewrite the store file wholesale; two
//! processes doing that concurrently would corrupt it in ways SQLite's own
//! locking cannot prevent (the swap is a filesystem rename). The lock file
//! lives next to the store.

use std::fs::OpenOptions;
use std::path::Path;

use aperture_core::errors::StorageError;

/// Run `f` while holding an exclusive advisory lock for the store at
/// `db_path`. Blocks until the lock is available.
pub fn with_process_lock<F, T, E>(db_path: &Path, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<StorageError>,
{
    let lock_path = lock_path_for(db_path);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            E::from(StorageError::ProcessLock {
                message: format!("create lock dir: {e}"),
            })
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| {
            E::from(StorageError::ProcessLock {
                message: format!("open {}: {e}", lock_path.display()),
            })
        })?;

    let mut lock = fd_lock::RwLock::new(file);
    let guard = lock.write().map_err(|e| {
        E::from(StorageError::ProcessLock {
            message: format!("acquire {}: {e}", lock_path.display()),
        })
    })?;

    let result = f();
    drop(guard);
    result
}

fn lock_path_for(db_path: &Path) -> std::path::PathBuf {
    let mut os = db_path.as_os_str().to_os_string();
    os.push(".lock");
    std::path::PathBuf::from(os)
}
