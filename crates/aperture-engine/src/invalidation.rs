//! Gatekeeper for cache reuse.
//!
//! An entry is valid iff its stored fingerprint matches the file's
//! current fingerprint and its stored schema version matches the engine's.
//! Any mismatch is a miss, and the stale row is deleted on the spot so
//! size accounting never counts orphans. Store-level schema mismatches
//! are enforced below us: the cache store refuses every operation until
//! the migration manager resolves them.

use std::path::Path;

use aperture_core::errors::StorageError;
use aperture_core::types::Fingerprint;
use aperture_storage::{CacheStore, SCHEMA_VERSION};

/// Outcome of a cache validity check.
#[derive(Debug)]
pub enum CacheDecision {
    /// Entry is valid; reuse the stored metadata without re-extraction.
    Hit(Vec<u8>),
    /// No entry, or a stale one (now deleted). Extract and re-cache.
    Miss,
}

/// Decides whether a cached entry is trustworthy before reuse.
pub struct InvalidationManager<'a> {
    store: &'a CacheStore,
}

impl<'a> InvalidationManager<'a> {
    pub fn new(store: &'a CacheStore) -> Self {
        Self { store }
    }

    /// Check the entry for `path` against the file's current fingerprint.
    pub fn check(
        &self,
        path: &Path,
        current: &Fingerprint,
    ) -> Result<CacheDecision, StorageError> {
        let Some(hit) = self.store.get(path)? else {
            return Ok(CacheDecision::Miss);
        };

        let valid = hit.schema_version == SCHEMA_VERSION
            && hit
                .fingerprint
                .as_ref()
                .is_some_and(|stored| stored.matches(current));

        if valid {
            Ok(CacheDecision::Hit(hit.metadata))
        } else {
            tracing::debug!(path = %path.display(), "stale cache entry invalidated");
            self.store.invalidate(path)?;
            Ok(CacheDecision::Miss)
        }
    }
}
