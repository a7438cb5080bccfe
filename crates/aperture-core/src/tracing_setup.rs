//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the Aperture tracing/logging system.
///
/// Reads the `APERTURE_LOG` environment variable for per-subsystem log
/// levels, e.g. `APERTURE_LOG=aperture_storage=debug,aperture_engine=info`.
/// Falls back to `aperture=info` if unset or invalid.
///
/// Idempotent — calling it multiple times is safe.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("APERTURE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("aperture=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    });
}
