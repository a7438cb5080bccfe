//! Shared data types: fingerprints, change records, run summaries.

pub mod media_kind;

pub use media_kind::MediaKind;

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Lightweight per-file signature used to detect change cheaply.
///
/// The cheap fields (size + mtime) are always present; the content hash is
/// computed only when the cheap fields disagree with the prior run or when
/// strong verification is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub file_size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
    /// xxh3-128 of file content, if computed.
    pub content_hash: Option<[u8; 16]>,
}

impl Fingerprint {
    /// Build a cheap fingerprint (no content hash) from stat data.
    pub fn cheap(file_size: u64, mtime: SystemTime) -> Self {
        let (mtime_secs, mtime_nanos) = mtime_parts(mtime);
        Self {
            file_size,
            mtime_secs,
            mtime_nanos,
            content_hash: None,
        }
    }

    /// Whether the cheap fields (size + mtime) are identical.
    pub fn cheap_eq(&self, other: &Fingerprint) -> bool {
        self.file_size == other.file_size
            && self.mtime_secs == other.mtime_secs
            && self.mtime_nanos == other.mtime_nanos
    }

    /// Whether this fingerprint matches another for cache-validity purposes.
    ///
    /// Equal cheap fields are a match without consulting hashes (the hash is
    /// skipped when size+mtime agree). When the cheap fields differ, the
    /// fingerprints match only if both carry a content hash and the hashes
    /// are equal (a touch with unchanged bytes).
    pub fn matches(&self, other: &Fingerprint) -> bool {
        if self.cheap_eq(other) {
            return true;
        }
        match (self.content_hash, other.content_hash) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Extract mtime as (seconds, nanoseconds) from SystemTime.
pub fn mtime_parts(mtime: SystemTime) -> (i64, u32) {
    match mtime.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(_) => (0, 0),
    }
}

/// Per-run classification of a file's status relative to the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    New,
    Modified,
    Deleted,
    ContentChanged,
    Unchanged,
}

impl ChangeKind {
    /// Stable lowercase name used in the change_log table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::ContentChanged => "content_changed",
            ChangeKind::Unchanged => "unchanged",
        }
    }

    /// Parse the stable name back. Unknown strings are `None`.
    pub fn parse(s: &str) -> Option<ChangeKind> {
        match s {
            "new" => Some(ChangeKind::New),
            "modified" => Some(ChangeKind::Modified),
            "deleted" => Some(ChangeKind::Deleted),
            "content_changed" => Some(ChangeKind::ContentChanged),
            "unchanged" => Some(ChangeKind::Unchanged),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file's classification for a single run. Produced by the tracker,
/// consumed to build the run's work plan, projected into change_log, then
/// discarded.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub prior: Option<Fingerprint>,
    pub current: Option<Fingerprint>,
}

/// Aggregate counts for one run. Reported to the caller even under
/// partial failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub cache_hits: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
    pub new: u64,
    pub modified: u64,
    pub content_changed: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheap_fields_match_without_hash() {
        let a = Fingerprint {
            file_size: 10,
            mtime_secs: 100,
            mtime_nanos: 5,
            content_hash: None,
        };
        let b = Fingerprint {
            content_hash: Some([1; 16]),
            ..a.clone()
        };
        assert!(a.matches(&b));
    }

    #[test]
    fn touched_file_matches_only_on_equal_hash() {
        let stored = Fingerprint {
            file_size: 10,
            mtime_secs: 100,
            mtime_nanos: 0,
            content_hash: Some([7; 16]),
        };
        let touched = Fingerprint {
            mtime_secs: 200,
            ..stored.clone()
        };
        assert!(stored.matches(&touched));

        let rewritten = Fingerprint {
            content_hash: Some([8; 16]),
            ..touched.clone()
        };
        assert!(!stored.matches(&rewritten));
    }

    #[test]
    fn change_kind_round_trips_through_names() {
        for kind in [
            ChangeKind::New,
            ChangeKind::Modified,
            ChangeKind::Deleted,
            ChangeKind::ContentChanged,
            ChangeKind::Unchanged,
        ] {
            assert_eq!(ChangeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ChangeKind::parse("renamed"), None);
    }
}
