//! Backpressure on in-flight extracted metadata bytes.

use std::sync::{Condvar, Mutex};

/// Caps the total bytes of extracted metadata buffered across workers, so
/// resident memory does not scale with directory size. A payload larger
/// than the whole limit is admitted alone rather than deadlocking.
pub struct ByteGate {
    limit: u64,
    inflight: Mutex<u64>,
    available: Condvar,
}

impl ByteGate {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
            inflight: Mutex::new(0),
            available: Condvar::new(),
        }
    }

    /// Block until `bytes` fit under the ceiling, then reserve them.
    pub fn acquire(&self, bytes: u64) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while *inflight > 0 && *inflight + bytes > self.limit {
            inflight = self
                .available
                .wait(inflight)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *inflight += bytes;
    }

    /// Release a reservation taken with `acquire`.
    pub fn release(&self, bytes: u64) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *inflight = inflight.saturating_sub(bytes);
        drop(inflight);
        self.available.notify_all();
    }
}
