//! End-to-end pipeline tests with a stub extractor: cache reuse,
//! touch-vs-rewrite classification, deletion, and per-file failure
//! recovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aperture_core::config::ApertureConfig;
use aperture_core::errors::{ExtractError, RunOutcome};
use aperture_core::events::{EngineEventHandler, EventDispatcher, RunProgressEvent};
use aperture_core::traits::{Cancellable, MetadataExtractor};
use aperture_engine::{Engine, WalkedFile};

/// Deterministic extractor that records calls and fails on demand.
#[derive(Default)]
struct StubExtractor {
    calls: Mutex<Vec<PathBuf>>,
    /// Always fail with a permanent error.
    corrupt: HashSet<PathBuf>,
    /// Fail once with a transient I/O error, then succeed.
    flaky: Mutex<HashSet<PathBuf>>,
    /// Sleep this long before answering.
    slow: HashSet<PathBuf>,
    delay_ms: u64,
}

impl StubExtractor {
    fn calls_for(&self, path: &Path) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MetadataExtractor for StubExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<u8>, ExtractError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.corrupt.contains(path) {
            return Err(ExtractError::Corrupt {
                path: path.to_path_buf(),
                message: "bad header".to_string(),
            });
        }
        if self.flaky.lock().unwrap().remove(path) {
            return Err(ExtractError::Io {
                path: path.to_path_buf(),
                message: "interrupted".to_string(),
            });
        }
        if self.slow.contains(path) {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
        }
        Ok(format!("meta:{}", path.display()).into_bytes())
    }
}

fn test_config(workers: usize, verify_hashes: bool) -> ApertureConfig {
    let mut config = ApertureConfig::default();
    config.scan.workers = Some(workers);
    config.scan.batch_size = Some(4);
    config.scan.verify_hashes = Some(verify_hashes);
    config.scan.extract_timeout_ms = Some(5_000);
    config
}

fn write_media(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Stand-in for the external walker: top-level files only, sorted.
fn walk(root: &Path) -> Vec<WalkedFile> {
    let mut files: Vec<WalkedFile> = std::fs::read_dir(root)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .map(|p| WalkedFile::from_path(p).unwrap())
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn summary_of(outcome: &RunOutcome) -> &aperture_core::types::RunSummary {
    outcome.summary()
}

#[test]
fn first_run_extracts_then_second_run_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_media(dir.path(), "a.jpg", b"photo-a");
    write_media(dir.path(), "b.mov", b"video-b");
    write_media(dir.path(), "c.png", b"photo-c");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(2, true), extractor.clone()).unwrap();

    let run1 = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s1 = summary_of(&run1);
    assert_eq!(s1.new, 3);
    assert_eq!(s1.processed, 3);
    assert_eq!(s1.cache_hits, 0);
    assert_eq!(run1.exit_code(), 0);

    let run2 = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s2 = summary_of(&run2);
    assert_eq!(s2.unchanged, 3);
    assert_eq!(s2.cache_hits, 3);
    assert_eq!(s2.processed, 0);

    // Idempotence: no filesystem change, no second extraction.
    assert_eq!(extractor.total_calls(), 3);
    assert_eq!(engine.store().size().unwrap().entries, 3);
}

#[test]
fn touched_file_with_identical_bytes_is_not_reextracted() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_media(dir.path(), "a.jpg", b"photo-a");
    write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(2, true), extractor.clone()).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();

    // Re-save with identical bytes: mtime moves, content does not.
    std::thread::sleep(Duration::from_millis(1_100));
    std::fs::write(&a, b"photo-a").unwrap();

    let run2 = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s2 = summary_of(&run2);
    assert_eq!(s2.unchanged, 2);
    assert_eq!(s2.cache_hits, 2);
    assert_eq!(s2.processed, 0);
    assert_eq!(extractor.calls_for(&a), 1);
}

#[test]
fn rewritten_file_is_content_changed_and_reextracted() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_media(dir.path(), "a.jpg", b"photo-a");
    write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(2, true), extractor.clone()).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();

    std::thread::sleep(Duration::from_millis(1_100));
    std::fs::write(&a, b"photo-a-edited").unwrap();

    let run2 = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s2 = summary_of(&run2);
    assert_eq!(s2.content_changed, 1);
    assert_eq!(s2.unchanged, 1);
    assert_eq!(s2.processed, 1);
    assert_eq!(extractor.calls_for(&a), 2);
}

#[test]
fn verification_off_reextracts_on_pure_touch() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_media(dir.path(), "a.jpg", b"photo-a");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(1, false), extractor.clone()).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();

    std::thread::sleep(Duration::from_millis(1_100));
    std::fs::write(&a, b"photo-a").unwrap();

    let run2 = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s2 = summary_of(&run2);
    assert_eq!(s2.modified, 1);
    assert_eq!(s2.processed, 1);
    assert_eq!(extractor.calls_for(&a), 2);
}

#[test]
fn deleted_file_loses_its_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_media(dir.path(), "a.jpg", b"photo-a");
    let b = write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(2, true), extractor).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();
    assert!(engine.store().get(&b).unwrap().is_some());

    std::fs::remove_file(&b).unwrap();
    let run2 = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s2 = summary_of(&run2);
    assert_eq!(s2.deleted, 1);
    assert_eq!(s2.unchanged, 1);

    assert!(engine.store().get(&b).unwrap().is_none());
    assert!(engine.store().get(&a).unwrap().is_some());
    assert_eq!(engine.store().size().unwrap().entries, 1);

    let runs = engine.store().recent_runs(1).unwrap();
    let changes = engine.store().changes_for_run(runs[0].id).unwrap();
    assert!(changes
        .iter()
        .any(|c| c.change_type == "deleted" && c.path == b.to_string_lossy()));
}

#[test]
fn one_corrupt_file_is_skipped_without_aborting_siblings() {
    let dir = tempfile::tempdir().unwrap();
    write_media(dir.path(), "a.jpg", b"photo-a");
    let b = write_media(dir.path(), "b.mov", b"video-b");
    write_media(dir.path(), "c.png", b"photo-c");

    let extractor = Arc::new(StubExtractor {
        corrupt: HashSet::from([b.clone()]),
        ..StubExtractor::default()
    });
    let engine = Engine::open(dir.path(), test_config(2, true), extractor.clone()).unwrap();

    let outcome = engine.run(dir.path(), walk(dir.path())).unwrap();
    assert!(matches!(outcome, RunOutcome::PartialFailure(_)));
    assert_eq!(outcome.exit_code(), 1);

    let s = outcome.summary();
    assert_eq!(s.skipped, 1);
    assert_eq!(s.processed, 2);
    assert_eq!(s.errors.len(), 1);

    // Permanent errors are never retried.
    assert_eq!(extractor.calls_for(&b), 1);
    assert!(engine.store().get(&b).unwrap().is_none());
    assert_eq!(engine.store().size().unwrap().entries, 2);
}

#[test]
fn transient_io_error_is_retried_once_within_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_media(dir.path(), "a.jpg", b"photo-a");
    write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor {
        flaky: Mutex::new(HashSet::from([a.clone()])),
        ..StubExtractor::default()
    });
    let engine = Engine::open(dir.path(), test_config(2, true), extractor.clone()).unwrap();

    let outcome = engine.run(dir.path(), walk(dir.path())).unwrap();
    assert!(matches!(outcome, RunOutcome::Success(_)));
    assert_eq!(outcome.summary().processed, 2);
    assert_eq!(outcome.summary().skipped, 0);
    assert_eq!(extractor.calls_for(&a), 2);
}

#[test]
fn extraction_timeout_is_a_skip_not_a_hang() {
    let dir = tempfile::tempdir().unwrap();
    write_media(dir.path(), "a.jpg", b"photo-a");
    let b = write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor {
        slow: HashSet::from([b.clone()]),
        delay_ms: 500,
        ..StubExtractor::default()
    });
    let mut config = test_config(2, true);
    config.scan.extract_timeout_ms = Some(50);
    let engine = Engine::open(dir.path(), config, extractor.clone()).unwrap();

    let outcome = engine.run(dir.path(), walk(dir.path())).unwrap();
    let s = outcome.summary();
    assert_eq!(s.skipped, 1);
    assert_eq!(s.processed, 1);
    // Timeouts are permanent for the run: no retry.
    assert_eq!(extractor.calls_for(&b), 1);
}

#[test]
fn cancelled_token_stops_new_batches() {
    let dir = tempfile::tempdir().unwrap();
    write_media(dir.path(), "a.jpg", b"photo-a");
    write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(2, true), extractor.clone()).unwrap();
    engine.cancellation_token().cancel();

    let outcome = engine.run(dir.path(), walk(dir.path())).unwrap();
    assert_eq!(outcome.summary().processed, 0);
    assert_eq!(extractor.total_calls(), 0);
    assert_eq!(engine.store().size().unwrap().entries, 0);
    assert_eq!(engine.store().recent_runs(1).unwrap()[0].status, "cancelled");
}

struct ProgressCollector {
    seen: Mutex<Vec<usize>>,
}

impl EngineEventHandler for ProgressCollector {
    fn on_run_progress(&self, event: &RunProgressEvent) {
        self.seen.lock().unwrap().push(event.processed);
    }
}

#[test]
fn progress_signal_is_monotonic_and_reaches_total() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        write_media(dir.path(), &format!("{i}.jpg"), format!("photo-{i}").as_bytes());
    }

    let collector = Arc::new(ProgressCollector {
        seen: Mutex::new(Vec::new()),
    });
    let mut events = EventDispatcher::new();
    events.register(collector.clone());

    let extractor = Arc::new(StubExtractor::default());
    // Single worker: the emitted sequence itself must be increasing.
    let engine =
        Engine::open_with_events(dir.path(), test_config(1, true), extractor, events).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();

    let seen = collector.seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*seen.last().unwrap(), 5);
}

#[test]
fn run_history_records_final_counts() {
    let dir = tempfile::tempdir().unwrap();
    write_media(dir.path(), "a.jpg", b"photo-a");
    write_media(dir.path(), "b.mov", b"video-b");

    let extractor = Arc::new(StubExtractor::default());
    let engine = Engine::open(dir.path(), test_config(2, true), extractor).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();

    let runs = engine.store().recent_runs(1).unwrap();
    let run = &runs[0];
    assert_eq!(run.status, "success");
    assert_eq!(run.new_files, Some(2));
    assert_eq!(run.total_files, Some(2));
    assert!(run.completed_at.is_some());
}
