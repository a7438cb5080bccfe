//! Configuration system for Aperture.
//! TOML-based, 4-layer resolution: CLI > env > project > user > defaults.

pub mod aperture_config;
pub mod backup_config;
pub mod cache_config;
pub mod scan_config;

pub use aperture_config::{ApertureConfig, CliOverrides};
pub use backup_config::BackupConfig;
pub use cache_config::{CacheConfig, PrunePolicy};
pub use scan_config::ScanConfig;
