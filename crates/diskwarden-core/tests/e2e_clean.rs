/// End-to-end cleaning tests: scan a temporary tree, approve results, clean,
/// and check the batch report, progress stream and quarantine contents.
use diskwarden_core::classify::ThreatIndex;
use diskwarden_core::cleaner::{clean_files, start_clean, CleanPolicy};
use diskwarden_core::config::EngineConfig;
use diskwarden_core::model::{
    Category, CleanProgress, Location, ResultId, SafetyVerdict, ScanResult,
};
use diskwarden_core::quarantine::{ItemHealth, QuarantineStore};
use diskwarden_core::scanner::scan_locations;
use diskwarden_core::CleanError;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn store_in(tmp: &TempDir) -> QuarantineStore {
    QuarantineStore::open(tmp.path().join("quarantine")).unwrap()
}

fn write_file(path: &Path, n: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![0xABu8; n]).unwrap();
}

/// A single-file result, as the classifier would produce for a large file.
fn single(path: PathBuf, size: u64, verdict: SafetyVerdict) -> ScanResult {
    ScanResult {
        id: ResultId::generate(),
        name: path.file_name().unwrap().to_string_lossy().to_string(),
        category: Category::Large,
        total_size: size,
        file_count: 1,
        representative_path: path.clone(),
        description: String::new(),
        verdict,
        scanned_at: Utc::now(),
        location_root: path.parent().unwrap().to_path_buf(),
        paths: vec![path],
        duplicate_group: None,
        threat: None,
    }
}

fn go() -> AtomicBool {
    AtomicBool::new(false)
}

// ── Batches ──────────────────────────────────────────────────────────────────

#[test]
fn one_vanished_file_does_not_abort_the_batch() {
    let tmp = TempDir::new().unwrap();
    let store = store_in(&tmp);
    let approved: Vec<ScanResult> = (0..5)
        .map(|i| {
            let path = tmp.path().join(format!("data/file{i}.bin"));
            write_file(&path, 100);
            single(path, 100, SafetyVerdict::NeedsConfirmation)
        })
        .collect();
    fs::remove_file(&approved[2].paths[0]).unwrap();

    let result = clean_files(&store, &approved, &CleanPolicy::new(), 2, None, &go()).unwrap();

    assert_eq!(result.files_removed, 4);
    assert_eq!(result.bytes_freed, 400);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("file2.bin"));
    assert_eq!(store.len(), 4);
}

#[test]
fn scanned_cache_is_cleaned_into_quarantine() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    for i in 0..20 {
        write_file(&cache.join(format!("entry{i}")), 512);
    }
    let loc = Location::bucket("Cache", &cache, Category::Cache, SafetyVerdict::AutoSafe);
    let report = scan_locations(
        &[loc],
        &EngineConfig::default(),
        &ThreatIndex::default(),
        None,
        &go(),
    );

    let store = store_in(&tmp);
    let result = clean_files(&store, &report.results, &CleanPolicy::new(), 4, None, &go()).unwrap();

    assert_eq!(result.files_removed, 20);
    assert_eq!(result.bytes_freed, report.total_size());
    assert_eq!(result.quarantined.len(), 20);
    assert!(result.errors.is_empty());
    assert_eq!(fs::read_dir(&cache).unwrap().count(), 0);
}

#[test]
fn never_auto_results_need_explicit_selection() {
    let tmp = TempDir::new().unwrap();
    let store = store_in(&tmp);
    let path = tmp.path().join("picked/thing.bin");
    write_file(&path, 10);
    let approved = vec![single(path.clone(), 10, SafetyVerdict::NeverAuto)];

    let skipped = clean_files(&store, &approved, &CleanPolicy::new(), 1, None, &go()).unwrap();
    assert_eq!(skipped.skipped, 1);
    assert_eq!(skipped.files_removed, 0);
    assert_eq!(skipped.warnings.len(), 1);
    assert!(path.exists());

    let policy = CleanPolicy::new().select_explicitly(approved[0].id);
    let cleaned = clean_files(&store, &approved, &policy, 1, None, &go()).unwrap();
    assert_eq!(cleaned.files_removed, 1);
    assert!(!path.exists());
    assert_eq!(store.len(), 1);
}

#[test]
fn permanent_delete_bypasses_quarantine_only_when_confirmed() {
    let tmp = TempDir::new().unwrap();
    let store = store_in(&tmp);
    let path = tmp.path().join("old.iso");
    write_file(&path, 64);
    let approved = vec![single(path.clone(), 64, SafetyVerdict::NeedsConfirmation)];

    let policy = CleanPolicy::new().confirm_permanent_delete(approved[0].id);
    let result = clean_files(&store, &approved, &policy, 1, None, &go()).unwrap();

    assert_eq!(result.files_removed, 1);
    assert_eq!(result.bytes_freed, 64);
    assert!(result.quarantined.is_empty());
    assert!(!path.exists());
    assert!(store.is_empty());
}

#[cfg(unix)]
#[test]
fn unwritable_store_aborts_the_whole_clean() {
    use std::os::unix::fs::PermissionsExt;

    // Root ignores permission bits, so the store would still be writable.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let tmp = TempDir::new().unwrap();
    let store = store_in(&tmp);
    let intents = tmp.path().join("quarantine/intents");
    fs::set_permissions(&intents, fs::Permissions::from_mode(0o500)).unwrap();

    let path = tmp.path().join("a.tmp");
    write_file(&path, 8);
    let approved = vec![single(path.clone(), 8, SafetyVerdict::AutoSafe)];
    let outcome = clean_files(&store, &approved, &CleanPolicy::new(), 1, None, &go());

    fs::set_permissions(&intents, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(matches!(outcome, Err(CleanError::StoreUnavailable(_))));
    assert!(path.exists());
}

// ── Duplicates ───────────────────────────────────────────────────────────────

/// Scan a Downloads-like location holding `older` and `newer`, identical
/// 4 KiB files, with `newer` as the keeper.
fn scan_duplicates(tmp: &TempDir) -> (ScanResult, PathBuf, PathBuf) {
    let downloads = tmp.path().join("Downloads");
    let older = downloads.join("report (1).pdf");
    let newer = downloads.join("report.pdf");
    write_file(&older, 4096);
    write_file(&newer, 4096);
    let now = SystemTime::now();
    set_mtime(&older, now - Duration::from_secs(3600));
    set_mtime(&newer, now);

    let config = EngineConfig {
        hash_min_size: 1024,
        ..EngineConfig::default()
    };
    let loc = Location::user_content("Downloads", &downloads);
    let report = scan_locations(&[loc], &config, &ThreatIndex::default(), None, &go());
    let dup = report
        .results
        .into_iter()
        .find(|r| r.category == Category::Duplicate)
        .unwrap();
    assert_eq!(dup.paths, vec![older.clone()]);
    (dup, older, newer)
}

fn set_mtime(path: &Path, when: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

#[test]
fn duplicate_is_kept_when_the_keeper_changed() {
    let tmp = TempDir::new().unwrap();
    let (dup, older, newer) = scan_duplicates(&tmp);
    fs::write(&newer, b"rewritten after the scan").unwrap();

    let store = store_in(&tmp);
    let policy = CleanPolicy::new().select_explicitly(dup.id);
    let result = clean_files(&store, &[dup], &policy, 1, None, &go()).unwrap();

    assert_eq!(result.files_removed, 0);
    assert_eq!(result.skipped, 1);
    assert!(result.warnings[0].contains("changed since the scan"));
    assert!(older.exists());
    assert!(store.is_empty());
}

#[test]
fn duplicate_that_changed_itself_is_put_back() {
    let tmp = TempDir::new().unwrap();
    let (dup, older, _newer) = scan_duplicates(&tmp);
    fs::write(&older, b"edited after the scan").unwrap();

    let store = store_in(&tmp);
    let result = clean_files(&store, &[dup], &CleanPolicy::new(), 1, None, &go()).unwrap();

    assert_eq!(result.files_removed, 0);
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(fs::read(&older).unwrap(), b"edited after the scan");
    assert!(store.is_empty());
}

#[test]
fn changed_duplicate_is_not_permanently_deleted() {
    let tmp = TempDir::new().unwrap();
    let (dup, older, _newer) = scan_duplicates(&tmp);
    fs::write(&older, b"edited after the scan").unwrap();

    let store = store_in(&tmp);
    let policy = CleanPolicy::new().confirm_permanent_delete(dup.id);
    let result = clean_files(&store, &[dup], &policy, 1, None, &go()).unwrap();

    assert_eq!(result.files_removed, 0);
    assert_eq!(result.warnings.len(), 1);
    assert!(older.exists());
}

#[test]
fn unchanged_duplicate_is_quarantined() {
    let tmp = TempDir::new().unwrap();
    let (dup, older, newer) = scan_duplicates(&tmp);

    let store = store_in(&tmp);
    let result = clean_files(&store, &[dup], &CleanPolicy::new(), 1, None, &go()).unwrap();

    assert_eq!(result.files_removed, 1);
    assert!(result.warnings.is_empty());
    assert!(!older.exists());
    assert!(newer.exists());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[test]
fn progress_is_sent_in_order_after_each_result() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(store_in(&tmp));
    let approved: Vec<ScanResult> = (0..4)
        .map(|i| {
            let path = tmp.path().join(format!("p/{i}.bin"));
            write_file(&path, 10 * (i + 1));
            single(path, 10 * (i as u64 + 1), SafetyVerdict::AutoSafe)
        })
        .collect();

    let handle = start_clean(Arc::clone(&store), approved, CleanPolicy::new(), 2);
    let progress: Vec<CleanProgress> = handle.progress_rx.iter().collect();
    let result = handle.join().unwrap();

    assert_eq!(progress.len(), 4);
    for (i, p) in progress.iter().enumerate() {
        assert_eq!(p.current, i + 1);
        assert_eq!(p.total, 4);
        assert_eq!(p.files_removed, i as u64 + 1);
    }
    assert_eq!(progress[3].space_freed, 100);
    assert_eq!(result.files_removed, 4);
}

#[test]
fn cancelling_mid_batch_keeps_completed_moves() {
    let tmp = TempDir::new().unwrap();
    let store = store_in(&tmp);
    let approved: Vec<ScanResult> = (0..4)
        .map(|i| {
            let path = tmp.path().join(format!("batch/{i}.bin"));
            write_file(&path, 32);
            single(path, 32, SafetyVerdict::AutoSafe)
        })
        .collect();
    let cancel = AtomicBool::new(false);

    // A rendezvous channel: the cleaner cannot start a third result before
    // the second progress message is taken, which happens after the cancel.
    let (tx, rx) = crossbeam_channel::bounded::<CleanProgress>(0);
    let (first, result) = std::thread::scope(|s| {
        let worker = s.spawn(|| {
            let tx = tx;
            clean_files(&store, &approved, &CleanPolicy::new(), 1, Some(&tx), &cancel)
        });
        let first = rx.recv().unwrap();
        cancel.store(true, Ordering::Relaxed);
        let _rest: Vec<CleanProgress> = rx.iter().collect();
        (first, worker.join().unwrap().unwrap())
    });

    assert_eq!(first.current, 1);
    assert_eq!(first.files_removed, 1);
    assert!(result.cancelled);
    assert!(result.files_removed >= 1 && result.files_removed < 4);

    // The report matches what the store actually holds.
    let listing = store.list();
    assert_eq!(listing.items.len() as u64, result.files_removed);
    assert_eq!(result.quarantined.len() as u64, result.files_removed);
    for listed in &listing.items {
        assert!(result.quarantined.contains(&listed.item.id));
        assert!(matches!(listed.health, ItemHealth::Intact));
    }

    // Everything not reported as moved is still at its original path.
    let held: Vec<&Path> = listing
        .items
        .iter()
        .map(|l| l.item.original_path.as_path())
        .collect();
    for r in &approved {
        let path = &r.paths[0];
        assert_ne!(path.exists(), held.contains(&path.as_path()));
    }
    assert!(approved[3].paths[0].exists());
}
