//! Backup snapshot and rotation tests.

use aperture_storage::backup;
use rusqlite::Connection;

#[test]
fn snapshot_file_copies_a_consistent_store() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.db");
    {
        let conn = Connection::open(&src).unwrap();
        conn.execute_batch(
            "CREATE TABLE t (k TEXT PRIMARY KEY, v TEXT);
             INSERT INTO t VALUES ('a', '1'), ('b', '2');",
        )
        .unwrap();
    }

    let dest = dir.path().join("nested/copy.db");
    backup::snapshot_file(&src, &dest).unwrap();

    let conn = Connection::open(&dest).unwrap();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 2);
}

#[test]
fn rotation_keeps_only_the_newest_backups() {
    let dir = tempfile::tempdir().unwrap();
    for stamp in 1..=7 {
        std::fs::write(dir.path().join(format!("aperture-{stamp:010}.db")), b"x").unwrap();
    }
    // Unrelated files are never rotation victims.
    std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

    let removed = backup::rotate_operational(dir.path(), 5).unwrap();
    assert_eq!(removed.len(), 2);

    let mut left: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(
        left,
        vec![
            "aperture-0000000003.db",
            "aperture-0000000004.db",
            "aperture-0000000005.db",
            "aperture-0000000006.db",
            "aperture-0000000007.db",
            "notes.txt",
        ]
    );
}

#[test]
fn rotation_on_missing_directory_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let removed = backup::rotate_operational(&dir.path().join("absent"), 3).unwrap();
    assert!(removed.is_empty());
}
