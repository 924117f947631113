//! Shared SHA-256 hex digest utilities.
//!
//! The worker's tool cache verifies installed entries with
//! [`sha256_file`]; [`sha256_hex`] is its in-memory counterpart for
//! computing catalog checksums.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Compute a SHA-256 hex digest of a file, streaming in 64 KiB chunks.
///
/// Tool archives run to hundreds of megabytes, so the file is never read
/// into memory whole.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let hash = hasher.finalize();
    Ok(format!("{hash:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn consistent_output() {
        let data = b"frame 0001";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn file_digest_matches_in_memory_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"tool archive bytes").unwrap();
        let on_disk = sha256_file(file.path()).unwrap();
        assert_eq!(on_disk, sha256_hex(b"tool archive bytes"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(sha256_file(Path::new("/nonexistent/archive.tar.xz")).is_err());
    }
}
