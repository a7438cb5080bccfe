//! Event payload types for the run, migration, and prune lifecycles.

use std::path::PathBuf;

/// Payload for `on_run_started`.
#[derive(Debug, Clone)]
pub struct RunStartedEvent {
    pub root: PathBuf,
    pub file_count: usize,
}

/// Payload for `on_run_progress`. `processed` is monotonically increasing
/// over the life of a run.
#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub processed: usize,
    pub total: usize,
}

/// Payload for `on_run_complete`.
#[derive(Debug, Clone)]
pub struct RunCompleteEvent {
    pub new: u64,
    pub modified: u64,
    pub content_changed: u64,
    pub deleted: u64,
    pub unchanged: u64,
    pub cache_hits: u64,
    pub skipped: u64,
    pub duration_ms: u64,
}

/// Payload for `on_run_error`.
#[derive(Debug, Clone)]
pub struct RunErrorEvent {
    pub message: String,
}

/// Payload for `on_migration_started`.
#[derive(Debug, Clone)]
pub struct MigrationStartedEvent {
    pub from_version: u32,
    pub to_version: u32,
}

/// Payload for `on_migration_complete`.
#[derive(Debug, Clone)]
pub struct MigrationCompleteEvent {
    pub version: u32,
    pub duration_ms: u64,
}

/// Payload for `on_prune_complete`.
#[derive(Debug, Clone)]
pub struct PruneCompleteEvent {
    pub evicted: u64,
    pub reclaimed_bytes: u64,
}
