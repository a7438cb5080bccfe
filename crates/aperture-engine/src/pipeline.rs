//! The run pipeline: migration gate, snapshot load, dispatch, finalize.
//!
//! `Engine::open` brings the store to the current schema before any read
//! or write is trusted, then every `run` call processes one directory
//! snapshot end-to-end. Per-file failures surface only as skip counts;
//! store-level failures abort the run with a single classified error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use aperture_core::config::{ApertureConfig, PrunePolicy};
use aperture_core::errors::{PipelineError, RunOutcome, StorageError};
use aperture_core::events::{
    EventDispatcher, MigrationCompleteEvent, MigrationStartedEvent, PruneCompleteEvent,
    RunCompleteEvent, RunErrorEvent, RunStartedEvent,
};
use aperture_core::traits::{CancellationToken, MetadataExtractor};
use aperture_core::types::{ChangeKind, ChangeRecord, RunSummary};
use aperture_storage::prune::{PruneLimit, PruneReport};
use aperture_storage::{backup, CacheStore, MigrationManager, SCHEMA_VERSION};
use rustc_hash::FxHashSet;

use crate::dispatcher::Dispatcher;
use crate::tracker::{PriorSnapshot, WalkedFile};

/// Drives runs against one store. Construction resolves the schema; a
/// mismatched store that cannot be migrated never yields an engine.
pub struct Engine {
    config: ApertureConfig,
    store: CacheStore,
    store_path: Option<PathBuf>,
    extractor: Arc<dyn MetadataExtractor>,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl Engine {
    /// Open the store under `root`, migrating it to the current schema
    /// first.
    pub fn open(
        root: &Path,
        config: ApertureConfig,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self, PipelineError> {
        Self::open_with_events(root, config, extractor, EventDispatcher::new())
    }

    /// Like `open`, with event handlers already registered so migration
    /// events reach them.
    pub fn open_with_events(
        root: &Path,
        config: ApertureConfig,
        extractor: Arc<dyn MetadataExtractor>,
        events: EventDispatcher,
    ) -> Result<Self, PipelineError> {
        let store_path = config.cache.store_path(root);
        if let Some(parent) = store_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                message: format!("create store directory {}: {e}", parent.display()),
            })?;
        }

        let mut manager = MigrationManager::new(&store_path)
            .skip_backup(config.backup.effective_skip_premigration());
        let from_version = manager.persisted_version()?;
        if from_version != SCHEMA_VERSION {
            events.emit_migration_started(&MigrationStartedEvent {
                from_version,
                to_version: SCHEMA_VERSION,
            });
        }
        let report = manager.ensure_current()?;
        if !report.steps_applied.is_empty() {
            tracing::info!(
                from = report.from_version,
                to = report.to_version,
                steps = report.steps_applied.len(),
                "store migrated"
            );
            events.emit_migration_complete(&MigrationCompleteEvent {
                version: report.to_version,
                duration_ms: report.duration_ms,
            });
        }

        let store = CacheStore::open(&store_path)?;
        store.record_store_config(
            config.cache.effective_size_limit_bytes(),
            config.cache.effective_compression(),
        )?;

        Ok(Self {
            config,
            store,
            store_path: Some(store_path),
            extractor,
            events,
            cancel: CancellationToken::new(),
        })
    }

    /// Engine over an in-memory store (for testing).
    pub fn in_memory(
        config: ApertureConfig,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self, PipelineError> {
        let store = CacheStore::open_in_memory()?;
        store.record_store_config(
            config.cache.effective_size_limit_bytes(),
            config.cache.effective_compression(),
        )?;
        Ok(Self {
            config,
            store,
            store_path: None,
            extractor,
            events: EventDispatcher::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Token shared with the dispatcher; cancelling it stops new batches
    /// while in-flight files finish.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process one directory snapshot.
    ///
    /// `files` comes from the external walker. Returns the run outcome
    /// with final counts; store-level failures return `Err` (the fatal
    /// path) after best-effort bookkeeping.
    pub fn run(&self, root: &Path, files: Vec<WalkedFile>) -> Result<RunOutcome, PipelineError> {
        let start = Instant::now();
        self.events.emit_run_started(&RunStartedEvent {
            root: root.to_path_buf(),
            file_count: files.len(),
        });

        let snapshot = PriorSnapshot::from_rows(self.store.load_snapshot()?);
        let run_id = self.store.begin_run(root)?;

        let dispatcher = Dispatcher::new(
            &self.store,
            Arc::clone(&self.extractor),
            &self.events,
            self.cancel.clone(),
            self.config.scan.clone(),
        );
        let outcome = dispatcher.dispatch(&files, &snapshot);

        if let Some(fatal) = outcome.fatal {
            return Err(self.fail_run(run_id, fatal.into()));
        }

        // Deleted = prior snapshot minus this walk. Deferred to the
        // finalizer so a path that reappears mid-run is never dropped by
        // a racing worker.
        let walked: FxHashSet<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        let mut records = outcome.records;
        if !outcome.cancelled {
            for path in snapshot.deleted_paths(&walked) {
                records.push(ChangeRecord {
                    prior: snapshot.get(&path).cloned(),
                    path,
                    kind: ChangeKind::Deleted,
                    current: None,
                });
            }
        }

        if let Err(e) = self.store.finalize_run(run_id, &records) {
            return Err(self.fail_run(run_id, e.into()));
        }

        let mut summary = RunSummary {
            processed: outcome.processed,
            cache_hits: outcome.cache_hits,
            skipped: outcome.skipped,
            errors: outcome.errors,
            duration_ms: start.elapsed().as_millis() as u64,
            ..RunSummary::default()
        };
        for record in &records {
            match record.kind {
                ChangeKind::New => summary.new += 1,
                ChangeKind::Modified => summary.modified += 1,
                ChangeKind::ContentChanged => summary.content_changed += 1,
                ChangeKind::Unchanged => summary.unchanged += 1,
                ChangeKind::Deleted => summary.deleted += 1,
            }
        }

        let status = if outcome.cancelled {
            "cancelled"
        } else if summary.skipped > 0 {
            "partial"
        } else {
            "success"
        };
        if let Err(e) = self.store.complete_run(run_id, &summary, status, None) {
            return Err(self.fail_run(run_id, e.into()));
        }
        if let Err(e) = self.store.checkpoint() {
            tracing::warn!(error = %e, "post-run checkpoint failed");
        }

        self.events.emit_run_complete(&RunCompleteEvent {
            new: summary.new,
            modified: summary.modified,
            content_changed: summary.content_changed,
            deleted: summary.deleted,
            unchanged: summary.unchanged,
            cache_hits: summary.cache_hits,
            skipped: summary.skipped,
            duration_ms: summary.duration_ms,
        });
        tracing::info!(
            new = summary.new,
            modified = summary.modified,
            content_changed = summary.content_changed,
            unchanged = summary.unchanged,
            deleted = summary.deleted,
            cache_hits = summary.cache_hits,
            skipped = summary.skipped,
            status,
            "run complete"
        );

        Ok(RunOutcome::from_summary(summary))
    }

    /// Evict cache entries per the configured limits.
    pub fn prune(&self, policy: PrunePolicy) -> Result<PruneReport, PipelineError> {
        let limit = match policy {
            PrunePolicy::MaxSizeBytes => {
                PruneLimit::MaxSizeBytes(self.config.cache.effective_size_limit_bytes())
            }
            PrunePolicy::MaxAge => PruneLimit::MaxAgeDays(self.config.cache.effective_max_age_days()),
            PrunePolicy::Smart => {
                PruneLimit::Smart(self.config.cache.effective_size_limit_bytes())
            }
        };
        let report = self.store.prune(limit)?;
        self.events.emit_prune_complete(&PruneCompleteEvent {
            evicted: report.evicted,
            reclaimed_bytes: report.reclaimed_bytes,
        });
        Ok(report)
    }

    /// Snapshot the store into the operational backup directory and
    /// rotate old backups out. Returns the backup path.
    pub fn backup_now(&self) -> Result<PathBuf, PipelineError> {
        let Some(store_path) = &self.store_path else {
            return Err(StorageError::Backup {
                message: "in-memory store has no backup directory".to_string(),
            }
            .into());
        };
        let dir = match &self.config.backup.backup_path {
            Some(dir) => PathBuf::from(dir),
            None => store_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("backups"),
        };
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let dest = dir.join(format!("aperture-{stamp}.db"));
        self.store.backup(&dest)?;
        backup::rotate_operational(&dir, self.config.backup.effective_max_operational())
            .map_err(PipelineError::from)?;
        Ok(dest)
    }

    fn fail_run(&self, run_id: i64, error: PipelineError) -> PipelineError {
        let message = error.to_string();
        self.store.mark_run_fatal(run_id, &message);
        self.events.emit_run_error(&RunErrorEvent { message });
        error
    }
}
