//! V001: Initial schema — metadata, file_info, store_meta, change_log,
//! run_history.

use super::MigrationOp;

pub const VERSION: u32 = 1;
pub const NAME: &str = "initial schema";

pub fn ops() -> Vec<MigrationOp> {
    vec![
        // Cache entries: one row of opaque extracted metadata per path.
        MigrationOp::CreateTable {
            name: "metadata",
            sql: "CREATE TABLE IF NOT EXISTS metadata (
                path TEXT PRIMARY KEY,
                content_hash BLOB,
                metadata_blob BLOB NOT NULL,
                schema_version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            ) STRICT",
        },
        // Fingerprint snapshot: the prior run's view of the filesystem.
        MigrationOp::CreateTable {
            name: "file_info",
            sql: "CREATE TABLE IF NOT EXISTS file_info (
                path TEXT PRIMARY KEY,
                file_size INTEGER NOT NULL,
                content_hash BLOB,
                mtime_secs INTEGER NOT NULL,
                mtime_nanos INTEGER NOT NULL
            ) STRICT",
        },
        // Store-level key/value state.
        MigrationOp::CreateTable {
            name: "store_meta",
            sql: "CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) STRICT",
        },
        // One row per path per run, consumed by external reporting.
        MigrationOp::CreateTable {
            name: "change_log",
            sql: "CREATE TABLE IF NOT EXISTS change_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                change_type TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            ) STRICT",
        },
        // Append-only log of runs.
        MigrationOp::CreateTable {
            name: "run_history",
            sql: "CREATE TABLE IF NOT EXISTS run_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at INTEGER NOT NULL,
                completed_at INTEGER,
                root_path TEXT NOT NULL,
                total_files INTEGER,
                new_files INTEGER,
                modified_files INTEGER,
                deleted_files INTEGER,
                unchanged_files INTEGER,
                cache_hits INTEGER,
                skipped INTEGER,
                duration_ms INTEGER,
                status TEXT NOT NULL DEFAULT 'running',
                error TEXT
            ) STRICT",
        },
        MigrationOp::Reindex {
            name: "idx_metadata_updated",
            table: "metadata",
            columns: "updated_at",
        },
        MigrationOp::Reindex {
            name: "idx_change_log_run",
            table: "change_log",
            columns: "run_id",
        },
        MigrationOp::Reindex {
            name: "idx_run_history_time",
            table: "run_history",
            columns: "started_at DESC",
        },
        MigrationOp::SetMeta {
            key: "created_at",
            value_sql: "strftime('%s','now')",
        },
    ]
}
