//! SHA-256 helpers used to verify object content on both sides of the
//! publish protocol.

use std::{
    io::{self, Read},
    path::Path,
};

use sha2::{Digest, Sha256};

/// Hashes a file already on disk, streaming it in fixed-size chunks so
/// large objects don't need to be buffered in memory.
pub fn sha256_file(path: &Path) -> io::Result<[u8; 32]> {
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
    Ok(hasher.finalize().into())
}

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// An incremental hasher used while streaming an upload to disk, so the
/// digest is ready the moment the last byte has been written without a
/// second read-back pass.
#[derive(Default)]
pub struct IncrementalSha256 {
    hasher: Sha256,
}

impl IncrementalSha256 {
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_oneshot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let oneshot = sha256_bytes(data);

        let mut inc = IncrementalSha256::new();
        for chunk in data.chunks(7) {
            inc.update(chunk);
        }
        assert_eq!(inc.finalize(), oneshot);
    }

    #[test]
    fn file_hash_matches_bytes_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        std::fs::write(&path, b"object content").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), sha256_bytes(b"object content"));
    }
}
