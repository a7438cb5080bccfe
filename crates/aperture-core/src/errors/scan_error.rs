//! Fingerprinting and classification errors.

use std::path::PathBuf;

/// Errors that can occur while fingerprinting files.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("IO error fingerprinting {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("run cancelled")]
    Cancelled,

    #[error("file too large: {path} ({size} bytes, max {max})")]
    MaxFileSizeExceeded { path: PathBuf, size: u64, max: u64 },
}

impl ScanError {
    /// Classify an IO error from reading `path` into the right variant.
    pub fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            ScanError::PermissionDenied { path }
        } else {
            ScanError::IoError { path, source }
        }
    }
}
