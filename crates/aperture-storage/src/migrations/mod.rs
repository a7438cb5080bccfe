//! Schema migrations using PRAGMA user_version.
//!
//! Migrations are a versioned list of discrete steps, each made of tagged
//! operations (`CreateTable`, `AddColumn`, `Backfill`, `Reindex`,
//! `SetMeta`) with a forward SQL rendering and, where feasible, a reverse
//! rendering. The manager never mutates the live store file: steps are
//! applied to a working copy which is atomically renamed over the live
//! file only on full success.

pub mod v001_initial;
pub mod v002_file_type;
pub mod v003_store_meta;

use std::path::{Path, PathBuf};
use std::time::Instant;

use aperture_core::errors::{MigrationError, StorageError};
use rusqlite::Connection;

use crate::backup;
use crate::process_lock::with_process_lock;

/// The schema version this engine build reads and writes.
pub const SCHEMA_VERSION: u32 = 3;

/// A single schema-changing operation inside a migration step.
#[derive(Debug, Clone)]
pub enum MigrationOp {
    CreateTable {
        name: &'static str,
        sql: &'static str,
    },
    AddColumn {
        table: &'static str,
        column: &'static str,
        decl: &'static str,
    },
    Backfill {
        table: &'static str,
        forward: &'static str,
        reverse: Option<&'static str>,
    },
    Reindex {
        name: &'static str,
        table: &'static str,
        columns: &'static str,
    },
    SetMeta {
        key: &'static str,
        /// SQL expression for the value (literal or builtin call).
        value_sql: &'static str,
    },
}

impl MigrationOp {
    /// Short human-readable description (for dry-run reports and errors).
    pub fn describe(&self) -> String {
        match self {
            MigrationOp::CreateTable { name, .. } => format!("create table {name}"),
            MigrationOp::AddColumn { table, column, .. } => {
                format!("add column {table}.{column}")
            }
            MigrationOp::Backfill { table, .. } => format!("backfill {table}"),
            MigrationOp::Reindex { name, table, .. } => {
                format!("index {name} on {table}")
            }
            MigrationOp::SetMeta { key, .. } => format!("set store_meta.{key}"),
        }
    }

    /// Render the forward SQL for this operation.
    pub fn forward_sql(&self) -> String {
        match self {
            MigrationOp::CreateTable { sql, .. } => (*sql).to_string(),
            MigrationOp::AddColumn {
                table,
                column,
                decl,
            } => format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"),
            MigrationOp::Backfill { forward, .. } => (*forward).to_string(),
            MigrationOp::Reindex {
                name,
                table,
                columns,
            } => format!("CREATE INDEX IF NOT EXISTS {name} ON {table}({columns})"),
            MigrationOp::SetMeta { key, value_sql } => format!(
                "INSERT OR IGNORE INTO store_meta (key, value) VALUES ('{key}', {value_sql})"
            ),
        }
    }

    /// Render the reverse SQL, if this operation is reversible.
    pub fn reverse_sql(&self) -> Option<String> {
        match self {
            MigrationOp::CreateTable { name, .. } => Some(format!("DROP TABLE IF EXISTS {name}")),
            MigrationOp::AddColumn { table, column, .. } => {
                Some(format!("ALTER TABLE {table} DROP COLUMN {column}"))
            }
            MigrationOp::Backfill { reverse, .. } => reverse.map(str::to_string),
            MigrationOp::Reindex { name, .. } => Some(format!("DROP INDEX IF EXISTS {name}")),
            MigrationOp::SetMeta { key, .. } => {
                Some(format!("DELETE FROM store_meta WHERE key = '{key}'"))
            }
        }
    }

    pub fn reversible(&self) -> bool {
        self.reverse_sql().is_some()
    }
}

/// One version bump: ordered operations taking the store from
/// `to_version - 1` to `to_version`.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub to_version: u32,
    pub name: &'static str,
    pub ops: Vec<MigrationOp>,
}

impl MigrationStep {
    pub fn from_version(&self) -> u32 {
        self.to_version - 1
    }

    pub fn reversible(&self) -> bool {
        self.ops.iter().all(MigrationOp::reversible)
    }
}

/// All known migration steps, in version order.
pub fn registry() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            to_version: v001_initial::VERSION,
            name: v001_initial::NAME,
            ops: v001_initial::ops(),
        },
        MigrationStep {
            to_version: v002_file_type::VERSION,
            name: v002_file_type::NAME,
            ops: v002_file_type::ops(),
        },
        MigrationStep {
            to_version: v003_store_meta::VERSION,
            name: v003_store_meta::NAME,
            ops: v003_store_meta::ops(),
        },
    ]
}

/// Where the migration manager believes the store stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Fresh store, no schema yet (user_version 0).
    Unversioned,
    /// Persisted version older than the engine requires.
    Versioned(u32),
    /// A migration is in flight on a working copy.
    Migrating,
    /// A migration step failed; the live store is untouched.
    Failed,
    /// Persisted version matches the engine.
    Valid,
}

/// Result of a successful migration (or a no-op).
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub steps_applied: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub duration_ms: u64,
}

/// Per-step result from a dry run.
#[derive(Debug, Clone)]
pub struct DryRunStep {
    pub to_version: u32,
    pub name: String,
    pub ops: Vec<String>,
}

/// Result of `dry_run`: what would happen, without committing anything.
#[derive(Debug, Clone)]
pub struct DryRunReport {
    pub from_version: u32,
    pub to_version: u32,
    pub steps: Vec<DryRunStep>,
}

/// Drives schema evolution for an on-disk store.
///
/// Runs once at startup, before any reads or writes are trusted.
pub struct MigrationManager {
    db_path: PathBuf,
    skip_backup: bool,
    state: SchemaState,
}

impl MigrationManager {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            skip_backup: false,
            state: SchemaState::Unversioned,
        }
    }

    /// Suppress the automatic pre-migration backup.
    pub fn skip_backup(mut self, skip: bool) -> Self {
        self.skip_backup = skip;
        self
    }

    pub fn state(&self) -> SchemaState {
        self.state
    }

    /// Read the persisted schema version (0 for a fresh store).
    pub fn persisted_version(&self) -> Result<u32, MigrationError> {
        if !self.db_path.exists() {
            return Ok(0);
        }
        let conn = Connection::open(&self.db_path).map_err(sqlite_err)?;
        version_of(&conn)
    }

    /// Bring the store to `SCHEMA_VERSION`, migrating if it is older.
    ///
    /// Refuses to touch a store whose persisted version is newer than this
    /// engine understands.
    pub fn ensure_current(&mut self) -> Result<MigrationReport, MigrationError> {
        let found = self.persisted_version()?;
        if found == SCHEMA_VERSION {
            self.state = SchemaState::Valid;
            return Ok(MigrationReport {
                from_version: found,
                to_version: found,
                steps_applied: Vec::new(),
                backup_path: None,
                duration_ms: 0,
            });
        }
        if found > SCHEMA_VERSION {
            self.state = SchemaState::Failed;
            return Err(MigrationError::NewerSchema {
                found,
                required: SCHEMA_VERSION,
            });
        }
        self.state = if found == 0 {
            SchemaState::Unversioned
        } else {
            SchemaState::Versioned(found)
        };
        self.migrate()
    }

    /// Apply all pending steps on a working copy, then swap it in.
    pub fn migrate(&mut self) -> Result<MigrationReport, MigrationError> {
        let start = Instant::now();
        let from_version = self.persisted_version()?;
        let pending: Vec<MigrationStep> = registry()
            .into_iter()
            .filter(|s| s.to_version > from_version)
            .collect();
        if pending.is_empty() {
            self.state = SchemaState::Valid;
            return Ok(MigrationReport {
                from_version,
                to_version: from_version,
                steps_applied: Vec::new(),
                backup_path: None,
                duration_ms: 0,
            });
        }

        self.state = SchemaState::Migrating;
        let db_path = self.db_path.clone();
        let skip_backup = self.skip_backup;

        let result: Result<(Vec<String>, Option<PathBuf>), MigrationError> =
            with_process_lock(&db_path, || {
                // Snapshot a backup of the live store before the first step.
                let backup_path = if db_path.exists() && !skip_backup {
                    let dest = premigration_backup_path(&db_path, from_version);
                    backup::snapshot_file(&db_path, &dest)?;
                    Some(dest)
                } else {
                    None
                };

                let working = working_copy_path(&db_path);
                copy_store_or_create(&db_path, &working)?;

                let mut applied = Vec::new();
                for step in &pending {
                    if let Err(e) = apply_step(&working, step) {
                        let _ = std::fs::remove_file(&working);
                        return Err(e);
                    }
                    tracing::info!(
                        version = step.to_version,
                        step = step.name,
                        "applied migration"
                    );
                    applied.push(format!("v{} {}", step.to_version, step.name));
                }

                swap_into_place(&working, &db_path)?;
                Ok((applied, backup_path))
            });

        match result {
            Ok((steps_applied, backup_path)) => {
                self.state = SchemaState::Valid;
                Ok(MigrationReport {
                    from_version,
                    to_version: SCHEMA_VERSION,
                    steps_applied,
                    backup_path,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                self.state = SchemaState::Failed;
                Err(e)
            }
        }
    }

    /// Execute all pending steps against a throwaway copy and report what
    /// would happen. The live store is never touched and the copy is
    /// always discarded.
    pub fn dry_run(&self) -> Result<DryRunReport, MigrationError> {
        let from_version = self.persisted_version()?;
        if from_version > SCHEMA_VERSION {
            return Err(MigrationError::NewerSchema {
                found: from_version,
                required: SCHEMA_VERSION,
            });
        }
        let pending: Vec<MigrationStep> = registry()
            .into_iter()
            .filter(|s| s.to_version > from_version)
            .collect();

        let scratch = scratch_copy_path(&self.db_path);
        copy_store_or_create(&self.db_path, &scratch)?;

        let mut steps = Vec::new();
        let mut failure = None;
        for step in &pending {
            match apply_step(&scratch, step) {
                Ok(()) => steps.push(DryRunStep {
                    to_version: step.to_version,
                    name: step.name.to_string(),
                    ops: step.ops.iter().map(MigrationOp::describe).collect(),
                }),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let _ = std::fs::remove_file(&scratch);

        match failure {
            Some(e) => Err(e),
            None => Ok(DryRunReport {
                from_version,
                to_version: SCHEMA_VERSION,
                steps,
            }),
        }
    }

    /// Roll the store back to `to_version`.
    ///
    /// Prefers the pre-migration backup taken for that version; falls back
    /// to applying reverse operations in reverse order on a working copy.
    /// Refuses if any step in range is irreversible and no backup exists.
    pub fn rollback(&mut self, to_version: u32) -> Result<(), MigrationError> {
        let current = self.persisted_version()?;
        if current <= to_version {
            return Ok(());
        }

        let db_path = self.db_path.clone();
        let backup_path = premigration_backup_path(&db_path, to_version);

        let result: Result<(), MigrationError> = with_process_lock(&db_path, || {
            if backup_path.exists() {
                let working = working_copy_path(&db_path);
                backup::snapshot_file(&backup_path, &working)?;
                swap_into_place(&working, &db_path)?;
                return Ok(());
            }

            // No backup: reverse the steps themselves.
            let descending: Vec<MigrationStep> = registry()
                .into_iter()
                .filter(|s| s.to_version > to_version && s.to_version <= current)
                .rev()
                .collect();
            for step in &descending {
                if !step.reversible() {
                    return Err(MigrationError::Irreversible {
                        step: step.name.to_string(),
                    });
                }
            }

            let working = working_copy_path(&db_path);
            copy_store_or_create(&db_path, &working)?;
            for step in &descending {
                if let Err(e) = reverse_step(&working, step) {
                    let _ = std::fs::remove_file(&working);
                    return Err(e);
                }
                tracing::info!(
                    version = step.to_version,
                    step = step.name,
                    "reversed migration"
                );
            }
            swap_into_place(&working, &db_path)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                self.state = match to_version {
                    0 => SchemaState::Unversioned,
                    v if v == SCHEMA_VERSION => SchemaState::Valid,
                    v => SchemaState::Versioned(v),
                };
                Ok(())
            }
            Err(e) => {
                self.state = SchemaState::Failed;
                Err(e)
            }
        }
    }
}

/// Apply every pending step directly to an open connection.
/// Used for in-memory stores, where there is no file to copy and swap.
pub fn apply_all(conn: &Connection) -> Result<(), MigrationError> {
    let current = version_of(conn)?;
    if current > SCHEMA_VERSION {
        return Err(MigrationError::NewerSchema {
            found: current,
            required: SCHEMA_VERSION,
        });
    }
    for step in registry().into_iter().filter(|s| s.to_version > current) {
        apply_step_on(conn, &step)?;
    }
    Ok(())
}

/// Get the schema version of an open connection.
pub fn version_of(conn: &Connection) -> Result<u32, MigrationError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(sqlite_err)
}

/// Verify an open connection is at the engine's schema version.
/// Any other version blocks all cache operations.
pub fn check_version(conn: &Connection) -> Result<(), StorageError> {
    let found = version_of(conn).map_err(|e| StorageError::SqliteError {
        message: e.to_string(),
    })?;
    if found != SCHEMA_VERSION {
        return Err(StorageError::SchemaMismatch {
            found,
            required: SCHEMA_VERSION,
        });
    }
    Ok(())
}

fn apply_step(db: &Path, step: &MigrationStep) -> Result<(), MigrationError> {
    let conn = Connection::open(db).map_err(|e| step_err(step, e))?;
    apply_step_on(&conn, step)
}

/// One step = one transaction: either every op lands and user_version
/// bumps, or nothing does. The store_meta version row is kept in
/// lockstep with user_version for external consumers that cannot read
/// pragmas.
fn apply_step_on(conn: &Connection, step: &MigrationStep) -> Result<(), MigrationError> {
    let tx = conn.unchecked_transaction().map_err(|e| step_err(step, e))?;
    for op in &step.ops {
        tx.execute_batch(&op.forward_sql()).map_err(|e| {
            MigrationError::StepFailed {
                step: format!("{} ({})", step.name, op.describe()),
                from_version: step.from_version(),
                to_version: step.to_version,
                message: e.to_string(),
            }
        })?;
    }
    write_version_row(&tx, step.to_version).map_err(|e| step_err(step, e))?;
    tx.pragma_update(None, "user_version", step.to_version)
        .map_err(|e| step_err(step, e))?;
    tx.commit().map_err(|e| step_err(step, e))?;
    Ok(())
}

fn write_version_row(conn: &Connection, version: u32) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES ('version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![version.to_string()],
    )
    .map(|_| ())
}

fn reverse_step(db: &Path, step: &MigrationStep) -> Result<(), MigrationError> {
    let conn = Connection::open(db).map_err(|e| step_err(step, e))?;
    let tx = conn.unchecked_transaction().map_err(|e| step_err(step, e))?;
    for op in step.ops.iter().rev() {
        let sql = op.reverse_sql().ok_or_else(|| MigrationError::Irreversible {
            step: step.name.to_string(),
        })?;
        tx.execute_batch(&sql).map_err(|e| MigrationError::StepFailed {
            step: format!("{} (reverse {})", step.name, op.describe()),
            from_version: step.to_version,
            to_version: step.from_version(),
            message: e.to_string(),
        })?;
    }
    // Reversing the initial step drops store_meta itself; the version row
    // only exists from v1 on.
    if step.from_version() >= 1 {
        write_version_row(&tx, step.from_version()).map_err(|e| step_err(step, e))?;
    }
    tx.pragma_update(None, "user_version", step.from_version())
        .map_err(|e| step_err(step, e))?;
    tx.commit().map_err(|e| step_err(step, e))?;
    Ok(())
}

fn copy_store_or_create(live: &Path, working: &Path) -> Result<(), MigrationError> {
    let _ = std::fs::remove_file(working);
    if live.exists() {
        backup::snapshot_file(live, working).map_err(MigrationError::from)
    } else {
        if let Some(parent) = working.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Touch an empty database file.
        Connection::open(working).map(|_| ()).map_err(sqlite_err)
    }
}

/// Atomically replace the live store with the migrated working copy.
/// Stale WAL/SHM sidecars belong to the replaced file and are removed
/// first so SQLite does not try to recover them against the new file.
fn swap_into_place(working: &Path, live: &Path) -> Result<(), MigrationError> {
    for suffix in ["-wal", "-shm"] {
        let mut os = live.as_os_str().to_os_string();
        os.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(os));
    }
    std::fs::rename(working, live).map_err(io_err)
}

fn working_copy_path(db: &Path) -> PathBuf {
    suffixed(db, ".migrating")
}

fn scratch_copy_path(db: &Path) -> PathBuf {
    suffixed(db, ".dryrun")
}

/// Backup taken before migrating away from `from_version`; rollback to
/// that version looks for this file.
fn premigration_backup_path(db: &Path, from_version: u32) -> PathBuf {
    suffixed(db, &format!(".pre-migrate-v{from_version}"))
}

fn suffixed(db: &Path, suffix: &str) -> PathBuf {
    let mut os = db.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn step_err(step: &MigrationStep, e: rusqlite::Error) -> MigrationError {
    MigrationError::StepFailed {
        step: step.name.to_string(),
        from_version: step.from_version(),
        to_version: step.to_version,
        message: e.to_string(),
    }
}

fn sqlite_err(e: rusqlite::Error) -> MigrationError {
    MigrationError::Sqlite {
        message: e.to_string(),
    }
}

fn io_err(e: std::io::Error) -> MigrationError {
    MigrationError::Io {
        message: e.to_string(),
    }
}
