//! Run-level errors and the outcome reported to callers.

use crate::types::RunSummary;

use super::{ConfigError, MigrationError, StorageError};

/// Fatal, run-aborting errors. Per-file failures are never one of these;
/// they are recovered inside the dispatcher and surface only as skip counts.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("store is corrupt: {message}")]
    CorruptStore { message: String },
}

/// Result of a completed run. Callers map this to a process exit code.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every file processed or served from cache.
    Success(RunSummary),
    /// The run completed but some files were skipped.
    PartialFailure(RunSummary),
}

impl RunOutcome {
    /// Build the outcome from a finished run's summary.
    pub fn from_summary(summary: RunSummary) -> Self {
        if summary.skipped == 0 {
            RunOutcome::Success(summary)
        } else {
            RunOutcome::PartialFailure(summary)
        }
    }

    /// The summary, regardless of outcome. Counts are always reported,
    /// even under partial failure.
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Success(s) | RunOutcome::PartialFailure(s) => s,
        }
    }

    /// Conventional process exit code: 0 success, 1 partial failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success(_) => 0,
            RunOutcome::PartialFailure(_) => 1,
        }
    }
}
