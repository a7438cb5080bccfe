//! Per-file extraction timeout guard.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use aperture_core::errors::ExtractError;
use aperture_core::traits::MetadataExtractor;

/// Run one extraction with a hard deadline.
///
/// The extractor runs on a guard thread; if it misses the deadline the
/// worker gets `ExtractError::Timeout` and moves on, while the guard
/// thread is left to finish and its late result is dropped (the bounded
/// channel keeps it from leaking). A hung extractor therefore costs one
/// detached thread, never a stalled worker pool.
pub fn extract_with_timeout(
    extractor: Arc<dyn MetadataExtractor>,
    path: &Path,
    timeout_ms: u64,
) -> Result<Vec<u8>, ExtractError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let thread_path = path.to_path_buf();
    std::thread::spawn(move || {
        let result = extractor.extract(&thread_path);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(result) => result,
        Err(_) => Err(ExtractError::Timeout {
            path: path.to_path_buf(),
            timeout_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowExtractor(u64);

    impl MetadataExtractor for SlowExtractor {
        fn extract(&self, _path: &Path) -> Result<Vec<u8>, ExtractError> {
            std::thread::sleep(Duration::from_millis(self.0));
            Ok(vec![1, 2, 3])
        }
    }

    #[test]
    fn fast_extraction_passes_through() {
        let result =
            extract_with_timeout(Arc::new(SlowExtractor(0)), Path::new("a.jpg"), 1_000);
        assert_eq!(result.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn slow_extraction_times_out() {
        let result =
            extract_with_timeout(Arc::new(SlowExtractor(500)), Path::new("a.jpg"), 20);
        assert!(matches!(result, Err(ExtractError::Timeout { .. })));
    }
}
