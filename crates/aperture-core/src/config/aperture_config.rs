//! Top-level Aperture configuration with 4-layer resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{BackupConfig, CacheConfig, ScanConfig};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`APERTURE_*`)
/// 3. Project config (`aperture.toml` in project root)
/// 4. User config (`~/.aperture/config.toml`)
/// 5. Compiled defaults
///
/// There are no process-wide mutable globals: the resolved value is passed
/// into each component at construction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApertureConfig {
    pub scan: ScanConfig,
    pub cache: CacheConfig,
    pub backup: BackupConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub verify_hashes: Option<bool>,
    pub cache_path: Option<std::path::PathBuf>,
}

impl ApertureConfig {
    /// Load configuration with 4-layer resolution.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Layer 4 (lowest priority): user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(ConfigError::ParseError { .. }) => {
                        return Err(ConfigError::ParseError {
                            path: user_config_path.display().to_string(),
                            message: "invalid TOML in user config".to_string(),
                        });
                    }
                    Err(_) => {
                        // Non-parse errors from user config are warnings, not
                        // fatal. Continue with defaults.
                    }
                }
            }
        }

        // Layer 3: project config
        let project_config_path = root.join("aperture.toml");
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        // Layer 2: environment variables
        Self::apply_env_overrides(&mut config);

        // Layer 1 (highest priority): CLI flags
        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &ApertureConfig) -> Result<(), ConfigError> {
        if let Some(batch_size) = config.scan.batch_size {
            if batch_size == 0 {
                return Err(ConfigError::ValidationFailed {
                    field: "scan.batch_size".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        if let Some(max_file_size) = config.scan.max_file_size {
            if max_file_size == 0 {
                return Err(ConfigError::ValidationFailed {
                    field: "scan.max_file_size".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        if let Some(timeout) = config.scan.extract_timeout_ms {
            if timeout == 0 {
                return Err(ConfigError::ValidationFailed {
                    field: "scan.extract_timeout_ms".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        if let Some(limit) = config.cache.size_limit_bytes {
            if limit == 0 {
                return Err(ConfigError::ValidationFailed {
                    field: "cache.size_limit_bytes".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns the user config path: `~/.aperture/config.toml`.
    fn user_config_path() -> Option<std::path::PathBuf> {
        dirs_path().map(|d| d.join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored (forward-compatible).
    fn merge_toml_file(config: &mut ApertureConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: ApertureConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`, where `other` values override `base` values
    /// only when `other` has a `Some` value.
    fn merge(base: &mut ApertureConfig, other: &ApertureConfig) {
        // Scan
        if other.scan.workers.is_some() {
            base.scan.workers = other.scan.workers;
        }
        if other.scan.batch_size.is_some() {
            base.scan.batch_size = other.scan.batch_size;
        }
        if other.scan.verify_hashes.is_some() {
            base.scan.verify_hashes = other.scan.verify_hashes;
        }
        if other.scan.max_file_size.is_some() {
            base.scan.max_file_size = other.scan.max_file_size;
        }
        if other.scan.extract_timeout_ms.is_some() {
            base.scan.extract_timeout_ms = other.scan.extract_timeout_ms;
        }
        if other.scan.max_inflight_bytes.is_some() {
            base.scan.max_inflight_bytes = other.scan.max_inflight_bytes;
        }

        // Cache
        if other.cache.path.is_some() {
            base.cache.path = other.cache.path.clone();
        }
        if other.cache.size_limit_bytes.is_some() {
            base.cache.size_limit_bytes = other.cache.size_limit_bytes;
        }
        if other.cache.max_age_days.is_some() {
            base.cache.max_age_days = other.cache.max_age_days;
        }
        if other.cache.compression.is_some() {
            base.cache.compression = other.cache.compression;
        }

        // Backup
        if other.backup.max_operational.is_some() {
            base.backup.max_operational = other.backup.max_operational;
        }
        if other.backup.backup_path.is_some() {
            base.backup.backup_path = other.backup.backup_path.clone();
        }
        if other.backup.skip_premigration.is_some() {
            base.backup.skip_premigration = other.backup.skip_premigration;
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `APERTURE_SCAN_WORKERS`, `APERTURE_CACHE_SIZE_LIMIT`, etc.
    fn apply_env_overrides(config: &mut ApertureConfig) {
        if let Ok(val) = std::env::var("APERTURE_SCAN_WORKERS") {
            if let Ok(v) = val.parse::<usize>() {
                config.scan.workers = Some(v);
            }
        }
        if let Ok(val) = std::env::var("APERTURE_SCAN_BATCH_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.scan.batch_size = Some(v);
            }
        }
        if let Ok(val) = std::env::var("APERTURE_SCAN_VERIFY_HASHES") {
            if let Ok(v) = val.parse::<bool>() {
                config.scan.verify_hashes = Some(v);
            }
        }
        if let Ok(val) = std::env::var("APERTURE_SCAN_MAX_FILE_SIZE") {
            if let Ok(v) = val.parse::<u64>() {
                config.scan.max_file_size = Some(v);
            }
        }
        if let Ok(val) = std::env::var("APERTURE_CACHE_PATH") {
            config.cache.path = Some(std::path::PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("APERTURE_CACHE_SIZE_LIMIT") {
            if let Ok(v) = val.parse::<u64>() {
                config.cache.size_limit_bytes = Some(v);
            }
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut ApertureConfig, cli: &CliOverrides) {
        if let Some(v) = cli.workers {
            config.scan.workers = Some(v);
        }
        if let Some(v) = cli.batch_size {
            config.scan.batch_size = Some(v);
        }
        if let Some(v) = cli.verify_hashes {
            config.scan.verify_hashes = Some(v);
        }
        if let Some(ref v) = cli.cache_path {
            config.cache.path = Some(v.clone());
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Returns the user-level aperture config directory: `~/.aperture/`.
fn dirs_path() -> Option<std::path::PathBuf> {
    home_dir().map(|h| h.join(".aperture"))
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(std::path::PathBuf::from)
}
