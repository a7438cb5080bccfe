//! Metadata extraction errors.
//!
//! A single file's failure never aborts a run: the dispatcher recovers
//! these locally, logs, and counts the file as skipped. Only `Io` is
//! retried (once per run); corrupt/unsupported files and timeouts are not.

use std::path::PathBuf;

/// Errors from an external metadata extractor.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error extracting {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("corrupt or unreadable file: {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("unsupported file type: {path}")]
    Unsupported { path: PathBuf },

    #[error("extraction timed out after {timeout_ms}ms: {path}")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("extractor failed on {path}: {message}")]
    Failed { path: PathBuf, message: String },
}

impl ExtractError {
    /// Whether a retry within the same run could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Io { .. })
    }
}
