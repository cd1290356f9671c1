/// Streaming content fingerprints with BLAKE3.
///
/// Files are read in fixed-size chunks and folded in order into a single
/// 256-bit digest, so memory stays bounded regardless of file size. Hash
/// equality is the sole criterion for declaring two files duplicates, which
/// is why a cryptographic digest is used rather than a fast 64-bit one.
///
/// Parallelism is across files only (see [`ContentHasher::hash_many`]); the
/// chunks of one file are never split between threads.
use crate::error::HashReadError;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// A 32-byte BLAKE3 content digest. Serialised as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(|h| Self(*h.as_bytes()))
    }

    /// Digest of an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash: {hex}")))
    }
}

/// Default read buffer size.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ContentHasher {
    chunk_size: usize,
    min_size: u64,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_size: 0,
        }
    }
}

impl ContentHasher {
    pub fn new(chunk_size: usize, min_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(4096),
            min_size,
        }
    }

    /// Minimum size for a file to take part in duplicate grouping.
    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    /// Whether a file of `size` bytes is worth hashing for dedup.
    pub fn is_eligible(&self, size: u64) -> bool {
        size > 0 && size >= self.min_size
    }

    /// Fingerprint one file by streaming it chunk by chunk.
    pub fn hash_file(&self, path: &Path) -> Result<ContentHash, HashReadError> {
        let wrap = |source| HashReadError {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(wrap)?;
        let mut reader = BufReader::with_capacity(self.chunk_size, file);
        self.hash_reader(&mut reader).map_err(wrap)
    }

    /// Fold a reader into a digest.
    pub fn hash_reader<R: Read>(&self, reader: &mut R) -> std::io::Result<ContentHash> {
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(ContentHash(*hasher.finalize().as_bytes()))
    }

    /// Hash many files in parallel on the current rayon pool.
    ///
    /// Files that fail to read are dropped (logged at debug) rather than
    /// retried. Cancellation is checked before each file is opened; a file
    /// already being hashed is finished.
    pub fn hash_many(
        &self,
        paths: &[PathBuf],
        cancel: &AtomicBool,
    ) -> Vec<(PathBuf, ContentHash)> {
        paths
            .par_iter()
            .filter_map(|path| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                match self.hash_file(path) {
                    Ok(hash) => Some((path.clone(), hash)),
                    Err(err) => {
                        tracing::debug!("Excluded from dedup: {err}");
                        None
                    }
                }
            })
            .collect()
    }
}
