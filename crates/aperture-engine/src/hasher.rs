//! Content hashing via xxh3-128.

use std::io::Read;
use std::path::Path;

use xxhash_rust::xxh3::{xxh3_128, Xxh3};

/// Compute the xxh3-128 hash of in-memory content.
#[inline]
pub fn hash_bytes(content: &[u8]) -> [u8; 16] {
    xxh3_128(content).to_le_bytes()
}

/// Compute the xxh3-128 hash of a file, streaming in 1MB chunks so large
/// videos never load whole into memory.
pub fn hash_file(path: &Path) -> std::io::Result<[u8; 16]> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; 1 << 20];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.digest128().to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn deterministic_hash() {
        let data = b"hello world";
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn file_hash_matches_bytes_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let content = vec![42u8; 3 * 1024 * 1024 + 17];
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&content)
            .unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&content));
    }
}
