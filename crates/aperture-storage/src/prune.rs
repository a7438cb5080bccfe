//! Bounded cache eviction.
//!
//! Eviction removes least-valuable entries first and never more than
//! required: size-bounded policies stop the moment the store fits the
//! budget again. Policy choice for `Smart` is strict least-recently-
//! updated order with ties broken by larger blob first.

use aperture_core::errors::StorageError;
use rusqlite::Connection;
use serde::Serialize;

use crate::queries::{metadata, now_secs};

/// Eviction constraint for one prune pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneLimit {
    /// Keep total metadata bytes at or under the budget.
    MaxSizeBytes(u64),
    /// Drop entries not updated within the age window.
    MaxAgeDays(u32),
    /// Size-bounded like `MaxSizeBytes`, with the smart tie-break.
    Smart(u64),
}

impl PruneLimit {
    /// Stable policy name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            PruneLimit::MaxSizeBytes(_) => "max_size_bytes",
            PruneLimit::MaxAgeDays(_) => "max_age",
            PruneLimit::Smart(_) => "smart",
        }
    }
}

/// What one prune pass did.
#[derive(Debug, Clone, Serialize)]
pub struct PruneReport {
    pub policy: String,
    pub examined: u64,
    pub evicted: u64,
    pub reclaimed_bytes: u64,
    pub remaining_entries: u64,
    pub remaining_bytes: u64,
}

/// Run one prune pass on an open connection. The caller holds the
/// store-wide exclusive barrier and wraps this in a single transaction.
pub fn run_prune(conn: &Connection, limit: PruneLimit) -> Result<PruneReport, StorageError> {
    let (entries_before, bytes_before) = metadata::count_and_bytes(conn)?;

    let (evicted, reclaimed) = match limit {
        PruneLimit::MaxSizeBytes(budget) => {
            evict_to_budget(conn, bytes_before, budget, false)?
        }
        PruneLimit::Smart(budget) => evict_to_budget(conn, bytes_before, budget, true)?,
        PruneLimit::MaxAgeDays(days) => {
            let cutoff = now_secs() - i64::from(days) * 86_400;
            metadata::delete_older_than(conn, cutoff)?
        }
    };

    let (remaining_entries, remaining_bytes) = metadata::count_and_bytes(conn)?;
    Ok(PruneReport {
        policy: limit.as_str().to_string(),
        examined: entries_before,
        evicted,
        reclaimed_bytes: reclaimed,
        remaining_entries,
        remaining_bytes,
    })
}

/// Evict least-recently-updated entries until `total` fits `budget`.
fn evict_to_budget(
    conn: &Connection,
    total: u64,
    budget: u64,
    smart_ties: bool,
) -> Result<(u64, u64), StorageError> {
    if total <= budget {
        return Ok((0, 0));
    }
    let mut evicted = 0u64;
    let mut reclaimed = 0u64;
    for (path, bytes, _updated_at) in metadata::eviction_candidates(conn, smart_ties)? {
        if total - reclaimed <= budget {
            break;
        }
        metadata::delete_entry(conn, &path)?;
        evicted += 1;
        reclaimed += bytes;
    }
    Ok((evicted, reclaimed))
}
