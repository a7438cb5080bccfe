//! Cache store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Eviction policy for `prune`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrunePolicy {
    /// Evict least-recently-updated entries until total metadata bytes fit.
    MaxSizeBytes,
    /// Evict entries not updated within the age window.
    MaxAge,
    /// Least-recently-updated first, ties broken by larger blob first.
    Smart,
}

/// Configuration for the cache store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Store file path. Default: `.aperture/aperture.db` under the root.
    pub path: Option<PathBuf>,
    /// Total metadata-byte budget enforced by prune. Default: 1GB.
    pub size_limit_bytes: Option<u64>,
    /// Age window for the max-age policy, in days. Default: 180.
    pub max_age_days: Option<u32>,
    /// Declared compression state, persisted to store_meta. Payloads are
    /// opaque to the engine either way.
    pub compression: Option<bool>,
}

impl CacheConfig {
    /// Resolve the store path relative to a project root.
    pub fn store_path(&self, root: &std::path::Path) -> PathBuf {
        match &self.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(".aperture").join("aperture.db"),
        }
    }

    pub fn effective_size_limit_bytes(&self) -> u64 {
        self.size_limit_bytes.unwrap_or(1024 * 1024 * 1024)
    }

    pub fn effective_max_age_days(&self) -> u32 {
        self.max_age_days.unwrap_or(180)
    }

    pub fn effective_compression(&self) -> bool {
        self.compression.unwrap_or(false)
    }
}
