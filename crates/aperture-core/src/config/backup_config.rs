//! Backup configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the backup subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackupConfig {
    /// Maximum operational backups kept by rotation. Default: 5.
    pub max_operational: Option<u32>,
    /// Custom backup directory. Default: sibling `backups/` next to the
    /// store file.
    pub backup_path: Option<String>,
    /// Suppress the automatic pre-migration backup.
    pub skip_premigration: Option<bool>,
}

impl BackupConfig {
    /// Returns the effective max operational backups, defaulting to 5.
    pub fn effective_max_operational(&self) -> u32 {
        self.max_operational.unwrap_or(5)
    }

    pub fn effective_skip_premigration(&self) -> bool {
        self.skip_premigration.unwrap_or(false)
    }
}
