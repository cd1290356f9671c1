/// Error taxonomy for the engine.
///
/// Per-item failures (a file that vanished, a directory we may not read) are
/// returned as values and collected into reports. Only catalog-level failures,
/// such as an unwritable quarantine store, abort a whole operation.
use std::path::PathBuf;
use thiserror::Error;

/// A path could not be read. Non-fatal: recorded and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot access {path}: {reason}")]
pub struct AccessError {
    pub path: PathBuf,
    pub reason: String,
}

/// A file became unreadable while its content was being fingerprinted.
///
/// Such files are silently excluded from duplicate grouping.
#[derive(Debug, Error)]
#[error("failed to hash {path}: {source}")]
pub struct HashReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failures of the quarantine store itself or of a single quarantine move.
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// The store directory is missing or unwritable. Aborts a whole clean.
    #[error("quarantine store at {path} is unavailable: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// Only regular files are quarantined; directories and links are refused.
    #[error("{path} is not a regular file")]
    NotARegularFile { path: PathBuf },

    /// The file could not be moved into the holding area.
    #[error("cannot move {path} into quarantine: {reason}")]
    MoveFailed { path: PathBuf, reason: String },

    /// The content could not be fingerprinted before the move.
    #[error(transparent)]
    Hash(#[from] HashReadError),

    /// A metadata record could not be written or parsed.
    #[error("quarantine metadata error for {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a restore is refused. Never auto-resolved by the engine.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("no quarantine item with id {id}")]
    NotFound { id: String },

    #[error("original directory {parent} no longer exists")]
    ParentMissing { parent: PathBuf },

    #[error("{path} is occupied by another file")]
    Occupied { path: PathBuf },

    #[error("checksum mismatch for {id}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// The item was flagged corrupt by an integrity check and is not restorable.
    #[error("quarantine item {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("I/O error during restore: {0}")]
    Io(#[from] std::io::Error),
}

/// The only failure that escapes a clean batch.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error(transparent)]
    StoreUnavailable(#[from] QuarantineError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
