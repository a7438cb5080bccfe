//! Bounded parallel work dispatcher.
//!
//! Partitions walked files into batches and fans each batch across a
//! rayon pool of at most `N` workers. Each worker runs
//! fingerprint → invalidation check → cache hit short-circuit; on miss it
//! calls the external extractor and writes through the cache store.
//!
//! A single file's failure (corrupt file, permission denied, timeout) is
//! recovered locally: logged, counted skipped, never fatal to the batch
//! or its siblings. Transient I/O errors get one retry within the run.
//! Store-level errors are the exception — they abort the run as one
//! classified fatal error.

pub mod byte_gate;
pub mod timeout;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aperture_core::config::ScanConfig;
use aperture_core::errors::StorageError;
use aperture_core::events::{EventDispatcher, RunProgressEvent};
use aperture_core::traits::{Cancellable, CancellationToken, MetadataExtractor};
use aperture_core::types::{ChangeRecord, Fingerprint};
use aperture_storage::CacheStore;
use rayon::prelude::*;

use self::byte_gate::ByteGate;
use self::timeout::extract_with_timeout;
use crate::invalidation::{CacheDecision, InvalidationManager};
use crate::tracker::{classify_file, PriorSnapshot, WalkedFile};

/// Aggregate result of one dispatch. Counts and final store contents are
/// identical for any worker count.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// One record per classified file (skipped files produce none).
    pub records: Vec<ChangeRecord>,
    /// Files actually extracted and written through.
    pub processed: u64,
    /// Files served from a valid cache entry.
    pub cache_hits: u64,
    /// Files dropped after an unrecoverable per-file error.
    pub skipped: u64,
    pub errors: Vec<String>,
    pub cancelled: bool,
    /// Store-level failure that aborted the dispatch, if any.
    pub fatal: Option<StorageError>,
}

/// Fans extraction work across a bounded worker pool.
pub struct Dispatcher<'a> {
    store: &'a CacheStore,
    extractor: Arc<dyn MetadataExtractor>,
    events: &'a EventDispatcher,
    cancel: CancellationToken,
    config: ScanConfig,
}

struct DispatchState {
    records: Mutex<Vec<ChangeRecord>>,
    errors: Mutex<Vec<String>>,
    fatal: Mutex<Option<StorageError>>,
    processed: AtomicU64,
    cache_hits: AtomicU64,
    skipped: AtomicU64,
    progress: AtomicUsize,
    gate: ByteGate,
    total: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        store: &'a CacheStore,
        extractor: Arc<dyn MetadataExtractor>,
        events: &'a EventDispatcher,
        cancel: CancellationToken,
        config: ScanConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            events,
            cancel,
            config,
        }
    }

    /// Process every walked file against the prior snapshot.
    pub fn dispatch(&self, files: &[WalkedFile], snapshot: &PriorSnapshot) -> DispatchOutcome {
        let state = DispatchState {
            records: Mutex::new(Vec::with_capacity(files.len())),
            errors: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
            processed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            progress: AtomicUsize::new(0),
            gate: ByteGate::new(self.config.effective_max_inflight_bytes()),
            total: files.len(),
        };

        let batch_size = self.config.effective_batch_size();
        let mut cancelled = false;

        // num_threads(0) lets rayon size the pool to the core count.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_workers())
            .build();

        let run_batches = |state: &DispatchState| -> bool {
            for batch in files.chunks(batch_size) {
                if self.cancel.is_cancelled() {
                    return true;
                }
                if state.fatal.lock().is_ok_and(|f| f.is_some()) {
                    return false;
                }
                batch
                    .par_iter()
                    .for_each(|file| self.process_one(file, snapshot, state));
            }
            false
        };

        match pool {
            Ok(pool) => cancelled |= pool.install(|| run_batches(&state)),
            Err(e) => {
                // Pool construction failing is not a reason to drop the
                // run; fall back to whatever pool par_iter finds.
                tracing::warn!(error = %e, "could not build worker pool; using default");
                cancelled |= run_batches(&state);
            }
        }

        DispatchOutcome {
            records: state.records.into_inner().unwrap_or_default(),
            processed: state.processed.load(Ordering::Relaxed),
            cache_hits: state.cache_hits.load(Ordering::Relaxed),
            skipped: state.skipped.load(Ordering::Relaxed),
            errors: state.errors.into_inner().unwrap_or_default(),
            cancelled,
            fatal: state.fatal.into_inner().ok().flatten(),
        }
    }

    /// One worker's handling of one file. Per-file errors end here.
    fn process_one(&self, file: &WalkedFile, snapshot: &PriorSnapshot, state: &DispatchState) {
        if state.fatal.lock().is_ok_and(|f| f.is_some()) {
            return;
        }

        let max_size = self.config.effective_max_file_size();
        if file.file_size > max_size {
            tracing::warn!(
                path = %file.path.display(),
                size = file.file_size,
                max = max_size,
                "file exceeds size limit; skipped"
            );
            self.skip(state, &file.path, "exceeds max file size");
            return;
        }

        let record = match classify_file(
            file,
            snapshot.get(&file.path),
            self.config.effective_verify_hashes(),
        ) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "fingerprint failed");
                self.skip(state, &file.path, &e.to_string());
                return;
            }
        };

        // Deleted never comes out of per-file classification; every other
        // kind goes through the validity gate. For changed files the gate
        // also deletes the stale row.
        let current = record
            .current
            .clone()
            .unwrap_or_else(|| Fingerprint::cheap(file.file_size, file.mtime));

        let invalidation = InvalidationManager::new(self.store);
        match invalidation.check(&file.path, &current) {
            Ok(CacheDecision::Hit(_metadata)) => {
                state.cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            Ok(CacheDecision::Miss) => {
                if !self.extract_and_store(file, &current, state) {
                    return;
                }
            }
            Err(e) => {
                self.fail_fatal(state, e);
                return;
            }
        }

        if let Ok(mut records) = state.records.lock() {
            records.push(record);
        }
        self.tick_progress(state);
    }

    /// Extract and write through. Returns false if the file was skipped
    /// or the store failed fatally.
    fn extract_and_store(
        &self,
        file: &WalkedFile,
        current: &Fingerprint,
        state: &DispatchState,
    ) -> bool {
        let timeout_ms = self.config.effective_extract_timeout_ms();

        let mut result =
            extract_with_timeout(Arc::clone(&self.extractor), &file.path, timeout_ms);
        if let Err(e) = &result {
            if e.is_transient() {
                tracing::debug!(path = %file.path.display(), error = %e, "retrying extraction");
                result = extract_with_timeout(Arc::clone(&self.extractor), &file.path, timeout_ms);
            }
        }

        let metadata = match result {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "extraction failed");
                self.skip(state, &file.path, &e.to_string());
                return false;
            }
        };

        let bytes = metadata.len() as u64;
        state.gate.acquire(bytes);
        let put = self.store.put(&file.path, current, &metadata);
        state.gate.release(bytes);

        match put {
            Ok(()) => {
                state.processed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.fail_fatal(state, e);
                false
            }
        }
    }

    fn skip(&self, state: &DispatchState, path: &PathBuf, reason: &str) {
        state.skipped.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut errors) = state.errors.lock() {
            errors.push(format!("{}: {reason}", path.display()));
        }
        self.tick_progress(state);
    }

    fn fail_fatal(&self, state: &DispatchState, error: StorageError) {
        tracing::error!(error = %error, "store failure; aborting dispatch");
        if let Ok(mut fatal) = state.fatal.lock() {
            fatal.get_or_insert(error);
        }
    }

    /// Monotonically increasing processed-count signal for external UIs.
    fn tick_progress(&self, state: &DispatchState) {
        let done = state.progress.fetch_add(1, Ordering::Relaxed) + 1;
        self.events.emit_run_progress(&RunProgressEvent {
            processed: done,
            total: state.total,
        });
    }
}
