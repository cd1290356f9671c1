/// Cleaning orchestrator: turns approved scan results into quarantine moves.
///
/// Results are processed in order and one progress message is sent after
/// each, so a consumer sees a monotonic `current` count. Files inside one
/// result are moved on a small rayon pool (`clean_workers`); the quarantine
/// store serializes its own metadata writes.
///
/// Per-file failures become entries in [`CleanResult::errors`]. The only
/// error that escapes is an unusable quarantine store, checked up front.
pub mod policy;

pub use policy::{CleanPolicy, Disposition};

use crate::error::{CleanError, QuarantineError};
use crate::hasher::{ContentHash, ContentHasher};
use crate::model::{CleanProgress, CleanResult, ScanResult};
use crate::quarantine::{QuarantineItem, QuarantineStore};
use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Progress messages buffered before the cleaner blocks on a slow consumer.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 1_024;

enum FileOutcome {
    Quarantined(QuarantineItem),
    Deleted(u64),
    /// Left in place, with the reason.
    Kept(String),
    Failed(String),
    Cancelled,
}

fn describe_failure(path: &Path, err: &QuarantineError) -> String {
    match err {
        QuarantineError::MoveFailed { .. } | QuarantineError::NotARegularFile { .. } => {
            err.to_string()
        }
        other => format!("{}: {other}", path.display()),
    }
}

fn changed_since_scan(path: &Path) -> String {
    format!(
        "kept {}: its content changed since the scan, so it is no longer a duplicate",
        path.display()
    )
}

/// Quarantine one file. `expected` is the content a duplicate had at scan
/// time; a file that no longer matches is put straight back.
fn quarantine_one(
    store: &QuarantineStore,
    path: &Path,
    result: &ScanResult,
    expected: Option<&ContentHash>,
    cancel: &AtomicBool,
) -> FileOutcome {
    if cancel.load(Ordering::Relaxed) {
        return FileOutcome::Cancelled;
    }
    let mut metadata = BTreeMap::new();
    metadata.insert("result_id".to_string(), result.id.to_string());
    metadata.insert("result_name".to_string(), result.name.clone());
    metadata.insert(
        "location_root".to_string(),
        result.location_root.display().to_string(),
    );
    let item = match store.quarantine(path, result.category, metadata) {
        Ok(item) => item,
        Err(err) => {
            warn!("Could not quarantine {}: {err}", path.display());
            return FileOutcome::Failed(describe_failure(path, &err));
        }
    };
    match expected {
        Some(hash) if *hash != item.checksum => match store.restore(&item.id) {
            Ok(_) => {
                warn!(quarantine_id = %item.id, "Duplicate changed since scan; restored");
                FileOutcome::Kept(changed_since_scan(path))
            }
            Err(err) => {
                warn!(quarantine_id = %item.id, "Could not put back changed duplicate: {err}");
                FileOutcome::Failed(format!(
                    "{} changed since the scan and could not be put back ({err}); restore {} manually",
                    path.display(),
                    item.id
                ))
            }
        },
        _ => FileOutcome::Quarantined(item),
    }
}

fn delete_one(
    hasher: &ContentHasher,
    path: &Path,
    expected: Option<&ContentHash>,
    cancel: &AtomicBool,
) -> FileOutcome {
    if cancel.load(Ordering::Relaxed) {
        return FileOutcome::Cancelled;
    }
    let size = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return FileOutcome::Failed(format!("{} is not a regular file", path.display())),
        Err(e) => return FileOutcome::Failed(format!("cannot delete {}: {e}", path.display())),
    };
    if let Some(hash) = expected {
        match hasher.hash_file(path) {
            Ok(actual) if actual == *hash => {}
            Ok(_) => return FileOutcome::Kept(changed_since_scan(path)),
            Err(e) => return FileOutcome::Failed(format!("cannot delete {}: {e}", path.display())),
        }
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(size, "Permanently deleted {}", path.display());
            FileOutcome::Deleted(size)
        }
        Err(e) => FileOutcome::Failed(format!("cannot delete {}: {e}", path.display())),
    }
}

/// Duplicate results are only removed while their keeper still holds the
/// content it had at scan time. Returns why the result must be skipped.
fn keeper_problem(result: &ScanResult, hasher: &ContentHasher) -> Option<String> {
    let group = result.duplicate_group.as_ref()?;
    let keeper = group.keeper()?;
    match hasher.hash_file(&keeper.path) {
        Ok(actual) if actual == keeper.hash => None,
        Ok(_) => Some(format!(
            "the copy being kept ({}) changed since the scan",
            keeper.path.display()
        )),
        Err(err) if err.source.kind() == ErrorKind::NotFound => Some(format!(
            "the copy being kept ({}) no longer exists",
            keeper.path.display()
        )),
        Err(err) => Some(format!("the copy being kept cannot be read: {err}")),
    }
}

/// Scan-time content of each removable duplicate, by path.
fn expected_hashes(result: &ScanResult) -> HashMap<&Path, &ContentHash> {
    result
        .duplicate_group
        .iter()
        .flat_map(|g| g.removable())
        .map(|m| (m.path.as_path(), &m.hash))
        .collect()
}

fn build_pool(workers: usize) -> Option<rayon::ThreadPool> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("diskwarden-clean-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!("Could not build clean pool ({err}); using the global pool");
            None
        }
    }
}

/// Remove exactly the files of `approved`, routed through `store`.
///
/// Never-auto results are skipped unless `policy` names them. Cancellation
/// is honoured between files; moves already made stay valid and are
/// reported.
pub fn clean_files(
    store: &QuarantineStore,
    approved: &[ScanResult],
    policy: &CleanPolicy,
    workers: usize,
    progress: Option<&Sender<CleanProgress>>,
    cancel: &AtomicBool,
) -> Result<CleanResult, CleanError> {
    let start = Instant::now();
    if let Err(err) = store.check_writable() {
        error!("Clean aborted: {err}");
        return Err(err.into());
    }

    let pool = build_pool(workers);
    let mut report = CleanResult::default();
    let total = approved.len();

    for (index, result) in approved.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            break;
        }

        let disposition = policy.disposition(result);
        if disposition == Disposition::Skip {
            report.skipped += 1;
            report.warnings.push(format!(
                "skipped \"{}\": never removed automatically; select it explicitly",
                result.name
            ));
        } else if let Some(reason) = keeper_problem(result, store.hasher()) {
            report.skipped += 1;
            report
                .warnings
                .push(format!("skipped \"{}\": {reason}", result.name));
        } else {
            debug!(
                result = %result.id,
                files = result.paths.len(),
                ?disposition,
                "Cleaning {}",
                result.name
            );
            let expected = expected_hashes(result);
            let work = || -> Vec<FileOutcome> {
                result
                    .paths
                    .par_iter()
                    .map(|path| {
                        let hash = expected.get(path.as_path()).copied();
                        match disposition {
                            Disposition::Delete => delete_one(store.hasher(), path, hash, cancel),
                            _ => quarantine_one(store, path, result, hash, cancel),
                        }
                    })
                    .collect()
            };
            let outcomes = match &pool {
                Some(pool) => pool.install(work),
                None => work(),
            };

            for outcome in outcomes {
                match outcome {
                    FileOutcome::Quarantined(item) => {
                        report.files_removed += 1;
                        report.bytes_freed += item.size;
                        report.quarantined.push(item.id);
                    }
                    FileOutcome::Deleted(size) => {
                        report.files_removed += 1;
                        report.bytes_freed += size;
                    }
                    FileOutcome::Kept(message) => report.warnings.push(message),
                    FileOutcome::Failed(message) => report.errors.push(message),
                    FileOutcome::Cancelled => report.cancelled = true,
                }
            }
        }

        if let Some(tx) = progress {
            let _ = tx.send(CleanProgress {
                current: index + 1,
                total,
                current_category: result.category,
                files_removed: report.files_removed,
                space_freed: report.bytes_freed,
            });
        }
        if report.cancelled {
            break;
        }
    }

    report.duration = start.elapsed();
    info!(
        files = report.files_removed,
        bytes = report.bytes_freed,
        errors = report.errors.len(),
        cancelled = report.cancelled,
        "Clean finished in {:?}",
        report.duration
    );
    Ok(report)
}

/// Handle to a clean running on a background thread.
pub struct CleanHandle {
    /// Receiver for per-result progress. Dropping it unsubscribes.
    pub progress_rx: Receiver<CleanProgress>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<Result<CleanResult, CleanError>>>,
}

impl CleanHandle {
    /// Stop before the next file; completed moves are kept.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn join(mut self) -> Result<CleanResult, CleanError> {
        match self.thread.take().map(|t| t.join()) {
            Some(Ok(result)) => result,
            _ => {
                error!("Cleaner thread panicked");
                Ok(CleanResult {
                    errors: vec!["clean aborted unexpectedly".to_string()],
                    cancelled: true,
                    ..CleanResult::default()
                })
            }
        }
    }
}

/// Run [`clean_files`] on a background thread.
pub fn start_clean(
    store: Arc<QuarantineStore>,
    approved: Vec<ScanResult>,
    policy: CleanPolicy,
    workers: usize,
) -> CleanHandle {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<CleanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("diskwarden-cleaner".into())
        .spawn(move || {
            info!("Cleaning {} approved results", approved.len());
            clean_files(
                &store,
                &approved,
                &policy,
                workers,
                Some(&progress_tx),
                &cancel_clone,
            )
        })
        .expect("failed to spawn cleaner thread");

    CleanHandle {
        progress_rx,
        cancel_flag,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ResultId, SafetyVerdict};
    use chrono::Utc;
    use std::fs;
    use std::path::PathBuf;

    fn result_for(paths: Vec<PathBuf>, verdict: SafetyVerdict) -> ScanResult {
        ScanResult {
            id: ResultId::generate(),
            name: "Temp files".into(),
            category: Category::Temp,
            total_size: 0,
            file_count: paths.len() as u64,
            representative_path: paths.first().cloned().unwrap_or_default(),
            description: String::new(),
            verdict,
            scanned_at: Utc::now(),
            location_root: PathBuf::from("/"),
            paths,
            duplicate_group: None,
            threat: None,
        }
    }

    #[test]
    fn never_auto_needs_selection() {
        let r = result_for(vec![], SafetyVerdict::NeverAuto);
        assert_eq!(CleanPolicy::new().disposition(&r), Disposition::Skip);
        let selected = CleanPolicy::new().select_explicitly(r.id);
        assert_eq!(selected.disposition(&r), Disposition::Quarantine);
    }

    #[test]
    fn permanent_delete_is_opt_in() {
        let r = result_for(vec![], SafetyVerdict::AutoSafe);
        assert_eq!(CleanPolicy::new().disposition(&r), Disposition::Quarantine);
        let policy = CleanPolicy::new().confirm_permanent_delete(r.id);
        assert_eq!(policy.disposition(&r), Disposition::Delete);
    }

    #[test]
    fn quarantines_and_counts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = QuarantineStore::open(tmp.path().join("q")).unwrap();
        let a = tmp.path().join("a.tmp");
        let b = tmp.path().join("b.tmp");
        fs::write(&a, vec![1u8; 10]).unwrap();
        fs::write(&b, vec![2u8; 20]).unwrap();

        let approved = vec![result_for(vec![a.clone(), b.clone()], SafetyVerdict::AutoSafe)];
        let cancel = AtomicBool::new(false);
        let result =
            clean_files(&store, &approved, &CleanPolicy::new(), 2, None, &cancel).unwrap();

        assert_eq!(result.files_removed, 2);
        assert_eq!(result.bytes_freed, 30);
        assert_eq!(result.quarantined.len(), 2);
        assert!(!a.exists() && !b.exists());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn cancelled_before_start_does_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = QuarantineStore::open(tmp.path().join("q")).unwrap();
        let a = tmp.path().join("a.tmp");
        fs::write(&a, b"x").unwrap();

        let cancel = AtomicBool::new(true);
        let approved = vec![result_for(vec![a.clone()], SafetyVerdict::AutoSafe)];
        let result =
            clean_files(&store, &approved, &CleanPolicy::new(), 1, None, &cancel).unwrap();

        assert!(result.cancelled);
        assert_eq!(result.files_removed, 0);
        assert!(a.exists());
    }
}
