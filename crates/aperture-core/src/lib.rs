//! Core types, traits, errors, config, events, and tracing for Aperture.
//!
//! Aperture keeps a persistent cache of per-file extracted metadata
//! consistent with a changing filesystem. This crate holds everything the
//! storage and engine crates share: the fingerprint and change-record types,
//! one error enum per subsystem, layered configuration, the event dispatcher,
//! cooperative cancellation, and the extractor seam.

pub mod config;
pub mod errors;
pub mod events;
pub mod tracing_setup;
pub mod traits;
pub mod types;

pub use types::{ChangeKind, ChangeRecord, Fingerprint, MediaKind, RunSummary};
