//! Fingerprint tracking: classify each walked file against the prior
//! run's snapshot using two-level change detection.
//!
//! Level 1 is the cheap fingerprint (size + mtime); level 2 is the
//! content hash, computed only for files whose cheap fields disagree with
//! the prior run and only when hash verification is enabled. A touched
//! file whose bytes are unchanged reclassifies `Unchanged` and is never
//! re-extracted.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use aperture_core::errors::ScanError;
use aperture_core::types::{ChangeKind, ChangeRecord, Fingerprint, MediaKind};
use aperture_storage::queries::file_info::FileInfoRow;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::hasher::hash_file;

/// One candidate file as the external walker reports it.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub file_size: u64,
    pub mtime: SystemTime,
}

impl WalkedFile {
    /// Stat a path into a walked file (convenience for callers without a
    /// walker of their own).
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|e| ScanError::from_io(path.clone(), e))?;
        let mtime = meta
            .modified()
            .map_err(|e| ScanError::from_io(path.clone(), e))?;
        Ok(Self {
            path,
            file_size: meta.len(),
            mtime,
        })
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_path(&self.path)
    }
}

/// The prior run's fingerprint snapshot, loaded read-only before a run
/// starts. It is never mutated during the run; the finalizer replaces the
/// persisted snapshot atomically at completion.
#[derive(Debug, Default)]
pub struct PriorSnapshot {
    entries: FxHashMap<PathBuf, Fingerprint>,
}

impl PriorSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from persisted file_info rows.
    pub fn from_rows(rows: Vec<FileInfoRow>) -> Self {
        let mut entries = FxHashMap::default();
        for row in rows {
            let fingerprint = Fingerprint {
                file_size: row.file_size as u64,
                mtime_secs: row.mtime_secs,
                mtime_nanos: row.mtime_nanos as u32,
                content_hash: row
                    .content_hash
                    .as_deref()
                    .and_then(|h| <[u8; 16]>::try_from(h).ok()),
            };
            entries.insert(PathBuf::from(row.path), fingerprint);
        }
        Self { entries }
    }

    pub fn get(&self, path: &Path) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths present in the prior snapshot but absent from the current
    /// walk, sorted for deterministic output.
    pub fn deleted_paths(&self, walked: &FxHashSet<PathBuf>) -> Vec<PathBuf> {
        let mut deleted: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|p| !walked.contains(*p))
            .cloned()
            .collect();
        deleted.sort();
        deleted
    }
}

/// Classify one walked file against its prior fingerprint.
///
/// With `verify_hashes` off, no content is ever read: a cheap-field
/// mismatch classifies `Modified` even if the bytes are unchanged (cheap,
/// may over-trigger re-extraction on pure touches).
pub fn classify_file(
    file: &WalkedFile,
    prior: Option<&Fingerprint>,
    verify_hashes: bool,
) -> Result<ChangeRecord, ScanError> {
    let mut current = Fingerprint::cheap(file.file_size, file.mtime);

    let Some(prior) = prior else {
        if verify_hashes {
            current.content_hash = Some(
                hash_file(&file.path).map_err(|e| ScanError::from_io(file.path.clone(), e))?,
            );
        }
        return Ok(ChangeRecord {
            path: file.path.clone(),
            kind: ChangeKind::New,
            prior: None,
            current: Some(current),
        });
    };

    // Level 1: size + mtime. The hash is skipped and carried forward.
    if current.cheap_eq(prior) {
        current.content_hash = prior.content_hash;
        return Ok(ChangeRecord {
            path: file.path.clone(),
            kind: ChangeKind::Unchanged,
            prior: Some(prior.clone()),
            current: Some(current),
        });
    }

    if !verify_hashes {
        return Ok(ChangeRecord {
            path: file.path.clone(),
            kind: ChangeKind::Modified,
            prior: Some(prior.clone()),
            current: Some(current),
        });
    }

    // Level 2: content hash distinguishes a touch from a rewrite.
    let hash = hash_file(&file.path).map_err(|e| ScanError::from_io(file.path.clone(), e))?;
    current.content_hash = Some(hash);
    let kind = match prior.content_hash {
        Some(prior_hash) if prior_hash == hash => ChangeKind::Unchanged,
        // No stored hash to compare against (written with verification
        // off): treat as modified and re-extract.
        None => ChangeKind::Modified,
        Some(_) => ChangeKind::ContentChanged,
    };
    Ok(ChangeRecord {
        path: file.path.clone(),
        kind,
        prior: Some(prior.clone()),
        current: Some(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> WalkedFile {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        WalkedFile::from_path(path).unwrap()
    }

    #[test]
    fn absent_prior_is_new_with_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.jpg", b"bytes");
        let record = classify_file(&file, None, true).unwrap();
        assert_eq!(record.kind, ChangeKind::New);
        assert!(record.current.unwrap().content_hash.is_some());
    }

    #[test]
    fn equal_cheap_fields_skip_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.jpg", b"bytes");
        let prior = Fingerprint {
            content_hash: Some([9; 16]),
            ..Fingerprint::cheap(file.file_size, file.mtime)
        };
        let record = classify_file(&file, Some(&prior), true).unwrap();
        assert_eq!(record.kind, ChangeKind::Unchanged);
        // Hash carried forward, not recomputed.
        assert_eq!(record.current.unwrap().content_hash, Some([9; 16]));
    }

    #[test]
    fn touch_with_same_bytes_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.jpg", b"bytes");
        let real_hash = crate::hasher::hash_bytes(b"bytes");
        let prior = Fingerprint {
            file_size: file.file_size,
            mtime_secs: 1, // stale mtime
            mtime_nanos: 0,
            content_hash: Some(real_hash),
        };
        let record = classify_file(&file, Some(&prior), true).unwrap();
        assert_eq!(record.kind, ChangeKind::Unchanged);
    }

    #[test]
    fn rewrite_with_new_bytes_is_content_changed() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.jpg", b"new bytes");
        let prior = Fingerprint {
            file_size: 3,
            mtime_secs: 1,
            mtime_nanos: 0,
            content_hash: Some(crate::hasher::hash_bytes(b"old")),
        };
        let record = classify_file(&file, Some(&prior), true).unwrap();
        assert_eq!(record.kind, ChangeKind::ContentChanged);
    }

    #[test]
    fn verification_off_never_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.jpg", b"bytes");
        let prior = Fingerprint {
            file_size: file.file_size,
            mtime_secs: 1,
            mtime_nanos: 0,
            content_hash: None,
        };
        let record = classify_file(&file, Some(&prior), false).unwrap();
        assert_eq!(record.kind, ChangeKind::Modified);
        assert!(record.current.unwrap().content_hash.is_none());
    }

    #[test]
    fn deleted_paths_are_prior_minus_walked() {
        let mut walked = FxHashSet::default();
        walked.insert(PathBuf::from("/x/a.jpg"));
        let snapshot = PriorSnapshot::from_rows(vec![
            FileInfoRow {
                path: "/x/a.jpg".into(),
                file_size: 1,
                content_hash: None,
                mtime_secs: 0,
                mtime_nanos: 0,
                file_type: None,
            },
            FileInfoRow {
                path: "/x/b.mov".into(),
                file_size: 1,
                content_hash: None,
                mtime_secs: 0,
                mtime_nanos: 0,
                file_type: None,
            },
        ]);
        assert_eq!(snapshot.deleted_paths(&walked), vec![PathBuf::from("/x/b.mov")]);
    }
}
