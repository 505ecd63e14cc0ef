// src/watch/cache.rs

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

use crate::errors::Result;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// In-memory file hash cache backing `skip_unchanged`.
///
/// A change event only counts as a change when the file's content hash
/// differs from the last one seen, so editor save storms and metadata-only
/// touches don't retrigger builds.
#[derive(Debug, Default)]
pub struct FileCache {
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the file's current hash; returns true if it differs from the
    /// previously recorded one (or the file was never seen).
    ///
    /// Files that cannot be read (deleted, mid-write) count as changed.
    pub fn changed(&mut self, path: &Path) -> bool {
        let hash = match compute_file_hash(path) {
            Ok(hash) => hash,
            Err(_) => {
                debug!(path = %path.display(), "unreadable file treated as changed");
                self.hashes.remove(path);
                return true;
            }
        };

        match self.hashes.insert(path.to_path_buf(), hash.clone()) {
            Some(previous) => previous != hash,
            None => true,
        }
    }
}
