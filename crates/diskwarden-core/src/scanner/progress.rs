/// Scan progress reporting: lightweight messages sent from the scan
/// thread to the consumer via a crossbeam channel.
use super::ScanWarning;
use std::path::PathBuf;
use std::time::Duration;

/// Progress updates sent while a catalog scan runs.
///
/// Locations are scanned concurrently, so `LocationStarted`/`LocationFinished`
/// pairs for different locations may interleave.
#[derive(Debug, Clone)]
pub enum ScanProgress {
    LocationStarted {
        name: String,
        root: PathBuf,
    },
    LocationFinished {
        name: String,
        results: usize,
        files: u64,
        bytes: u64,
    },
    /// A non-fatal condition (unreadable root, traversal cap hit).
    Warning(ScanWarning),
    /// Scanning completed. The full report is returned by `ScanHandle::join`.
    Complete {
        duration: Duration,
        result_count: usize,
        warning_count: usize,
    },
    /// Scan was cancelled; the report holds only completed locations.
    Cancelled,
}
