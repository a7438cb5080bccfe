//! The Aperture engine: change classification, cache invalidation, and
//! the bounded parallel dispatcher that drives extraction through the
//! cache store.
//!
//! Directory traversal and the extractors themselves are external: the
//! engine consumes walked files and a `MetadataExtractor` implementation,
//! and keeps the store consistent with what it is told about the
//! filesystem.

pub mod dispatcher;
pub mod hasher;
pub mod invalidation;
pub mod pipeline;
pub mod tracker;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use invalidation::{CacheDecision, InvalidationManager};
pub use pipeline::Engine;
pub use tracker::{classify_file, PriorSnapshot, WalkedFile};
