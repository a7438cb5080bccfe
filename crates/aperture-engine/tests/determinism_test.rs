//! Worker-count determinism: the same file set yields the same final
//! store regardless of parallelism.

use std::path::Path;
use std::sync::Arc;

use aperture_core::config::ApertureConfig;
use aperture_core::errors::ExtractError;
use aperture_core::traits::MetadataExtractor;
use aperture_engine::{Engine, WalkedFile};

struct ContentExtractor;

impl MetadataExtractor for ContentExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<u8>, ExtractError> {
        // Payload derived from content only, so identical files yield
        // identical entries across roots.
        let content = std::fs::read(path).map_err(|e| ExtractError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(content.iter().rev().copied().collect())
    }
}

fn populate(root: &Path) {
    for i in 0..9 {
        let name = match i % 3 {
            0 => format!("img-{i}.jpg"),
            1 => format!("clip-{i}.mov"),
            _ => format!("shot-{i}.png"),
        };
        std::fs::write(root.join(name), format!("media-content-{i}").repeat(i + 1)).unwrap();
    }
}

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

/// Run a full pipeline with `workers` and return the final store as
/// (relative path, stored hash) pairs plus the headline counts.
fn run_with_workers(workers: usize) -> (Vec<(String, Option<Vec<u8>>)>, u64, u64) {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let mut config = ApertureConfig::default();
    config.scan.workers = Some(workers);
    config.scan.batch_size = Some(3);
    config.scan.verify_hashes = Some(true);

    let engine = Engine::open(dir.path(), config, Arc::new(ContentExtractor)).unwrap();
    let outcome = engine.run(dir.path(), walk(dir.path())).unwrap();
    let summary = outcome.summary();

    let prefix = dir.path().to_string_lossy().into_owned();
    let entries = engine
        .store()
        .entries()
        .unwrap()
        .into_iter()
        .map(|(path, hash)| {
            let rel = path
                .strip_prefix(&prefix)
                .unwrap_or(&path)
                .trim_start_matches(std::path::MAIN_SEPARATOR)
                .to_string();
            (rel, hash)
        })
        .collect();
    (entries, summary.processed, summary.cache_hits)
}

#[test]
fn final_store_is_identical_for_any_worker_count() {
    let serial = run_with_workers(1);
    let four = run_with_workers(4);
    let auto = run_with_workers(0);

    assert_eq!(serial.0.len(), 9);
    assert_eq!(serial, four);
    assert_eq!(serial, auto);
}

#[test]
fn second_run_is_deterministic_too() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let mut config = ApertureConfig::default();
    config.scan.workers = Some(4);
    config.scan.batch_size = Some(2);

    let engine = Engine::open(dir.path(), config, Arc::new(ContentExtractor)).unwrap();
    engine.run(dir.path(), walk(dir.path())).unwrap();
    let before: Vec<(String, Option<Vec<u8>>)> = engine.store().entries().unwrap();

    let outcome = engine.run(dir.path(), walk(dir.path())).unwrap();
    assert_eq!(outcome.summary().unchanged, 9);
    assert_eq!(outcome.summary().cache_hits, 9);
    assert_eq!(engine.store().entries().unwrap(), before);
}
