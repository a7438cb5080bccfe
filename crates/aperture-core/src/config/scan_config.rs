//! Scan/dispatch configuration.

use serde::{Deserialize, Serialize};

/// Configuration for fingerprinting and the parallel dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker count. 0 or unset = detected core count.
    pub workers: Option<usize>,
    /// Files per dispatch batch. Default: 64.
    pub batch_size: Option<usize>,
    /// Verify content hashes when size+mtime disagree. Default: true.
    /// When false, a touched file re-extracts even if its bytes are
    /// unchanged.
    pub verify_hashes: Option<bool>,
    /// Maximum file size to fingerprint (bytes). Default: 4GB.
    pub max_file_size: Option<u64>,
    /// Per-file extraction timeout in milliseconds. Default: 30s.
    pub extract_timeout_ms: Option<u64>,
    /// Ceiling on in-flight extracted metadata bytes. Default: 256MB.
    pub max_inflight_bytes: Option<u64>,
}

impl ScanConfig {
    /// Effective worker count; 0 means let the pool detect core count.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(0)
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(64).max(1)
    }

    pub fn effective_verify_hashes(&self) -> bool {
        self.verify_hashes.unwrap_or(true)
    }

    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(4 * 1024 * 1024 * 1024)
    }

    pub fn effective_extract_timeout_ms(&self) -> u64 {
        self.extract_timeout_ms.unwrap_or(30_000)
    }

    pub fn effective_max_inflight_bytes(&self) -> u64 {
        self.max_inflight_bytes.unwrap_or(256 * 1024 * 1024)
    }
}
