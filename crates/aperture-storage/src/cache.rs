//! The cache store facade.
//!
//! Path-keyed persistence of extracted metadata with fingerprint-based
//! staleness. Concurrency discipline:
//!
//! - ordinary operations (`put`, `get`, `invalidate`, `size`) take the
//!   store-wide barrier in read mode plus, for writes, a per-path mutex —
//!   writes to different paths never wait on each other's lock;
//! - `backup`, `restore`, `prune`, `clear`, and run finalization take the
//!   barrier in write mode: they drain in-flight per-path writes and block
//!   new ones until released.
//!
//! Every operation that touches cache rows is gated on the persisted
//! schema version. A mismatched store (older, newer, or fresh) answers
//! `StorageError::SchemaMismatch` until the migration manager resolves it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use aperture_core::errors::StorageError;
use aperture_core::types::{ChangeKind, ChangeRecord, Fingerprint, MediaKind, RunSummary};
use rustc_hash::FxHashMap;

use crate::backup;
use crate::connection::writer::with_immediate_transaction;
use crate::connection::StoreManager;
use crate::migrations::{self, SCHEMA_VERSION};
use crate::prune::{run_prune, PruneLimit, PruneReport};
use crate::queries::{self, change_log, file_info, metadata, run_history, store_meta};

/// A valid-looking cache row: opaque metadata plus the fingerprint it was
/// stored under. Validity against the file's *current* fingerprint is the
/// invalidation manager's call, not ours.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub metadata: Vec<u8>,
    /// Stored fingerprint, if the snapshot row survives (a pruned or
    /// missing file_info row leaves this `None`).
    pub fingerprint: Option<Fingerprint>,
    pub schema_version: u32,
}

/// Entry count and total metadata bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSize {
    pub entries: u64,
    pub total_bytes: u64,
}

/// Durable, path-keyed persistence for extracted metadata.
pub struct CacheStore {
    manager: StoreManager,
    barrier: RwLock<()>,
    path_locks: Mutex<FxHashMap<PathBuf, Arc<Mutex<()>>>>,
    persisted_version: AtomicU32,
}

impl CacheStore {
    /// Open the store at `path`.
    ///
    /// Opening never migrates. A store whose persisted version differs
    /// from the engine's opens successfully but answers `SchemaMismatch`
    /// to every cache operation until migration resolves it (the caller
    /// runs the migration manager first in the normal startup order).
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let manager = StoreManager::open(path)?;
        let version = manager.with_writer(|conn| {
            migrations::version_of(conn).map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })
        })?;
        Ok(Self {
            manager,
            barrier: RwLock::new(()),
            path_locks: Mutex::new(FxHashMap::default()),
            persisted_version: AtomicU32::new(version),
        })
    }

    /// Open an in-memory store at the current schema (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let manager = StoreManager::open_in_memory()?;
        manager.with_writer(|conn| {
            migrations::apply_all(conn).map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })
        })?;
        Ok(Self {
            manager,
            barrier: RwLock::new(()),
            path_locks: Mutex::new(FxHashMap::default()),
            persisted_version: AtomicU32::new(SCHEMA_VERSION),
        })
    }

    /// Re-read the persisted schema version (after an external migration
    /// or a restore swapped the file under us).
    pub fn refresh_schema_gate(&self) -> Result<u32, StorageError> {
        let version = self.manager.with_writer(|conn| {
            migrations::version_of(conn).map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })
        })?;
        self.persisted_version.store(version, Ordering::SeqCst);
        Ok(version)
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        let found = self.persisted_version.load(Ordering::SeqCst);
        if found != SCHEMA_VERSION {
            return Err(StorageError::SchemaMismatch {
                found,
                required: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    fn lock_for(&self, path: &Path) -> Result<Arc<Mutex<()>>, StorageError> {
        let mut map = self.path_locks.lock().map_err(|_| StorageError::SqliteError {
            message: "path lock map poisoned".to_string(),
        })?;
        Ok(Arc::clone(
            map.entry(path.to_path_buf()).or_insert_with(Default::default),
        ))
    }

    fn read_barrier(&self) -> Result<std::sync::RwLockReadGuard<'_, ()>, StorageError> {
        self.barrier.read().map_err(|_| StorageError::SqliteError {
            message: "store barrier poisoned".to_string(),
        })
    }

    fn write_barrier(&self) -> Result<std::sync::RwLockWriteGuard<'_, ()>, StorageError> {
        self.barrier.write().map_err(|_| StorageError::SqliteError {
            message: "store barrier poisoned".to_string(),
        })
    }

    // ---- Cache operations ----

    /// Write one entry: metadata row plus its fingerprint snapshot row,
    /// in a single transaction. Idempotent; last writer wins for the same
    /// path. On I/O failure mid-write the previous entry stays intact
    /// (the transaction is the staging slot).
    pub fn put(
        &self,
        path: &Path,
        fingerprint: &Fingerprint,
        metadata_bytes: &[u8],
    ) -> Result<(), StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        let entry_lock = self.lock_for(path)?;
        let _entry = entry_lock.lock().map_err(|_| StorageError::SqliteError {
            message: "per-path lock poisoned".to_string(),
        })?;

        let key = path.to_string_lossy();
        let kind = MediaKind::from_path(path);
        let hash = fingerprint.content_hash;
        self.manager.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                metadata::upsert_entry(
                    tx,
                    &key,
                    hash.as_ref().map(|h| h.as_slice()),
                    metadata_bytes,
                    SCHEMA_VERSION,
                )?;
                file_info::upsert_row(
                    tx,
                    &key,
                    fingerprint.file_size as i64,
                    hash.as_ref().map(|h| h.as_slice()),
                    fingerprint.mtime_secs,
                    i64::from(fingerprint.mtime_nanos),
                    kind.as_str(),
                )
            })
        })
    }

    /// Look up one entry. `None` is a plain miss; validity of a returned
    /// hit is still subject to the fingerprint check upstream.
    pub fn get(&self, path: &Path) -> Result<Option<CacheHit>, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        let key = path.to_string_lossy();
        let row = self
            .manager
            .with_reader(|conn| metadata::get_entry(conn, &key))?;
        Ok(row.map(|r| {
            let fingerprint = match (r.file_size, r.mtime_secs, r.mtime_nanos) {
                (Some(size), Some(secs), Some(nanos)) => Some(Fingerprint {
                    file_size: size as u64,
                    mtime_secs: secs,
                    mtime_nanos: nanos as u32,
                    content_hash: r
                        .content_hash
                        .as_deref()
                        .and_then(|h| <[u8; 16]>::try_from(h).ok()),
                }),
                _ => None,
            };
            CacheHit {
                metadata: r.metadata_blob,
                fingerprint,
                schema_version: r.schema_version,
            }
        }))
    }

    /// Remove one entry immediately. Returns whether a row existed.
    /// The fingerprint snapshot row is left to the run finalizer.
    pub fn invalidate(&self, path: &Path) -> Result<bool, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        let entry_lock = self.lock_for(path)?;
        let _entry = entry_lock.lock().map_err(|_| StorageError::SqliteError {
            message: "per-path lock poisoned".to_string(),
        })?;
        let key = path.to_string_lossy();
        self.manager
            .with_writer(|conn| with_immediate_transaction(conn, |tx| metadata::delete_entry(tx, &key)))
    }

    /// Entry count and total metadata bytes.
    pub fn size(&self) -> Result<StoreSize, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        let (entries, total_bytes) = self
            .manager
            .with_reader(metadata::count_and_bytes)?;
        Ok(StoreSize {
            entries,
            total_bytes,
        })
    }

    /// All entry paths and hashes, ordered by path (for reporting and
    /// store comparison).
    pub fn entries(&self) -> Result<Vec<(String, Option<Vec<u8>>)>, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager.with_reader(metadata::all_entries)
    }

    /// Evict entries per the policy, in one transaction behind the
    /// exclusive barrier.
    pub fn prune(&self, limit: PruneLimit) -> Result<PruneReport, StorageError> {
        self.ensure_schema()?;
        let _store = self.write_barrier()?;
        let report = self
            .manager
            .with_writer(|conn| with_immediate_transaction(conn, |tx| run_prune(tx, limit)))?;
        tracing::info!(
            policy = report.policy,
            evicted = report.evicted,
            reclaimed_bytes = report.reclaimed_bytes,
            "pruned cache"
        );
        Ok(report)
    }

    /// Remove every entry. Returns the number removed.
    pub fn clear(&self) -> Result<u64, StorageError> {
        self.ensure_schema()?;
        let _store = self.write_barrier()?;
        self.manager
            .with_writer(|conn| with_immediate_transaction(conn, |tx| metadata::clear(tx)))
    }

    // ---- Whole-store snapshot ----

    /// Snapshot the whole store to `dest` behind the exclusive barrier,
    /// so the copy never captures a half-written entry. Works on a
    /// schema-mismatched store: backing up is part of fixing one.
    pub fn backup(&self, dest: &Path) -> Result<(), StorageError> {
        let _store = self.write_barrier()?;
        self.manager
            .with_writer(|conn| backup::create_backup(conn, dest))?;
        tracing::info!(dest = %dest.display(), "store backed up");
        Ok(())
    }

    /// Replace the store contents from a backup file. On failure the live
    /// store is unaffected. The schema gate re-arms from the restored
    /// file's version.
    pub fn restore(&self, src: &Path) -> Result<(), StorageError> {
        let _store = self.write_barrier()?;
        self.manager
            .with_writer_mut(|conn| backup::restore_from_backup(conn, src))?;
        let version = self.refresh_schema_gate()?;
        tracing::info!(src = %src.display(), version, "store restored");
        Ok(())
    }

    // ---- Store meta ----

    /// Read one store_meta value.
    pub fn meta(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager.with_reader(|conn| store_meta::get(conn, key))
    }

    /// Persist the declared store limits from configuration.
    pub fn record_store_config(
        &self,
        size_limit_bytes: u64,
        compression: bool,
    ) -> Result<(), StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                store_meta::set(tx, store_meta::KEY_SIZE_LIMIT, &size_limit_bytes.to_string())?;
                store_meta::set(tx, store_meta::KEY_COMPRESSION, &compression.to_string())
            })
        })
    }

    // ---- Run bookkeeping ----

    /// Load the prior-run fingerprint snapshot.
    pub fn load_snapshot(&self) -> Result<Vec<file_info::FileInfoRow>, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager.with_reader(file_info::load_all)
    }

    /// Insert the run start row. Returns the run id.
    pub fn begin_run(&self, root: &Path) -> Result<i64, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        let root_str = root.to_string_lossy();
        self.manager.with_writer(|conn| {
            run_history::insert_run_start(conn, queries::now_secs(), &root_str)
        })
    }

    /// Finalize a run in one transaction behind the exclusive barrier:
    /// deleted paths lose both their cache entry and snapshot row, every
    /// surviving path's snapshot row is refreshed to the current
    /// fingerprint, and the change log gains one row per path. This is
    /// the atomic snapshot replacement — a reader sees the old snapshot
    /// or the new one, never a mix.
    pub fn finalize_run(
        &self,
        run_id: i64,
        records: &[ChangeRecord],
    ) -> Result<(), StorageError> {
        self.ensure_schema()?;
        let _store = self.write_barrier()?;
        self.manager.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                for record in records {
                    let key = record.path.to_string_lossy();
                    match record.kind {
                        ChangeKind::Deleted => {
                            file_info::delete_row(tx, &key)?;
                            metadata::delete_entry(tx, &key)?;
                        }
                        _ => {
                            if let Some(fp) = &record.current {
                                let kind = MediaKind::from_path(&record.path);
                                file_info::upsert_row(
                                    tx,
                                    &key,
                                    fp.file_size as i64,
                                    fp.content_hash.as_ref().map(|h| h.as_slice()),
                                    fp.mtime_secs,
                                    i64::from(fp.mtime_nanos),
                                    kind.as_str(),
                                )?;
                            }
                        }
                    }
                    change_log::insert(tx, run_id, &key, record.kind)?;
                }
                Ok(())
            })
        })
    }

    /// Record run completion counts and status.
    pub fn complete_run(
        &self,
        run_id: i64,
        summary: &RunSummary,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager.with_writer(|conn| {
            run_history::update_run_complete(conn, run_id, queries::now_secs(), summary, status, error)
        })
    }

    /// Best-effort fatal marker on the way out of an aborted run.
    pub fn mark_run_fatal(&self, run_id: i64, error: &str) {
        let result = self.manager.with_writer(|conn| {
            run_history::mark_run_fatal(conn, run_id, queries::now_secs(), error)
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "could not mark run fatal");
        }
    }

    /// Recent runs, newest first (external reporting).
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<run_history::RunHistoryRow>, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager
            .with_reader(|conn| run_history::query_recent(conn, limit))
    }

    /// Change rows for one run, ordered by path (external reporting).
    pub fn changes_for_run(&self, run_id: i64) -> Result<Vec<change_log::ChangeLogRow>, StorageError> {
        self.ensure_schema()?;
        let _store = self.read_barrier()?;
        self.manager
            .with_reader(|conn| change_log::for_run(conn, run_id))
    }

    /// WAL checkpoint after run completion.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.manager.checkpoint()
    }
}
