//! SQLite persistence for Aperture.
//!
//! The cache store is path-keyed: one row of extracted metadata per file,
//! guarded by fingerprint and schema-version checks. Writes are serialized
//! through a single WAL connection; reads go through a small round-robin
//! pool. Schema evolution is handled by the migration manager, which only
//! ever mutates a working copy of the store.

pub mod backup;
pub mod cache;
pub mod connection;
pub mod migrations;
pub mod process_lock;
pub mod prune;
pub mod queries;

pub use cache::{CacheHit, CacheStore, StoreSize};
pub use connection::StoreManager;
pub use migrations::{MigrationManager, MigrationReport, SchemaState, SCHEMA_VERSION};
pub use prune::{PruneLimit, PruneReport};
