//! Shared traits: cancellation, the extractor seam.

pub mod cancellation;
pub mod extractor;

pub use cancellation::{Cancellable, CancellationToken};
pub use extractor::MetadataExtractor;
