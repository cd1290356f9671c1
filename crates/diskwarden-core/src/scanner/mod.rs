/// Scanner module: walks catalog locations and classifies what it finds.
///
/// Locations are independent, so they are scanned on a bounded rayon pool
/// (`scan_workers` threads, small by default so the disk is not saturated).
/// Each worker walks one location, streams its candidates into a
/// [`Classifier`], and hashes duplicate candidates on the same pool.
///
/// [`start_scan`] runs a catalog scan on a background thread and reports
/// through a bounded crossbeam channel; [`scan_locations`] is the synchronous
/// form used by the engine facade and tests.
pub mod progress;
pub mod walk;

use crate::catalog::LocationCatalog;
use crate::classify::{Classifier, ClassifierSettings, ThreatIndex};
use crate::config::EngineConfig;
use crate::error::AccessError;
use crate::hasher::ContentHasher;
use crate::model::{Location, ScanResult};
use crate::platform::{probe_access, AccessClass, ProbeReport};
use progress::ScanProgress;
use walk::{LocationWalker, TraversalLimit, WalkSummary};

use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Maximum number of progress messages that may queue up in the channel.
///
/// A catalog scan sends a handful of messages per location, so this only
/// fills if the consumer stops draining; the scanner then stalls rather
/// than consuming unbounded heap.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// How often (in candidates) a location walk checks for cancellation.
const CANCEL_CHECK_INTERVAL: u64 = 1_000;

/// A non-fatal condition recorded during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScanWarning {
    /// A depth or entry cap stopped the walk; totals cover only what was visited.
    TraversalLimitReached {
        location: String,
        root: PathBuf,
        limit: TraversalLimit,
    },
    /// Entries inside the location that could not be read.
    Inaccessible {
        location: String,
        root: PathBuf,
        count: u64,
    },
    /// The root itself could not be read; the location yielded nothing.
    RootUnavailable {
        location: String,
        root: PathBuf,
        reason: String,
    },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TraversalLimitReached {
                location, limit, ..
            } => write!(f, "{location}: stopped at the {limit}; results are partial"),
            Self::Inaccessible {
                location, count, ..
            } => write!(f, "{location}: {count} entries could not be read"),
            Self::RootUnavailable {
                location,
                root,
                reason,
            } => write!(f, "{location}: cannot read {} ({reason})", root.display()),
        }
    }
}

/// Everything a scan produced. Best-effort: partial results plus warnings.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub results: Vec<ScanResult>,
    pub warnings: Vec<ScanWarning>,
    pub probes: Vec<ProbeReport>,
    /// Entries skipped because they could not be read, across all locations.
    pub inaccessible: u64,
    /// A sample of those entries with the reason each was unreadable.
    pub access_errors: Vec<AccessError>,
    pub cancelled: bool,
    pub duration: Duration,
}

impl ScanReport {
    pub fn total_size(&self) -> u64 {
        self.results.iter().map(|r| r.total_size).sum()
    }
}

struct LocationOutcome {
    results: Vec<ScanResult>,
    warnings: Vec<ScanWarning>,
    probe: ProbeReport,
    inaccessible: u64,
    access_errors: Vec<AccessError>,
    completed: bool,
}

/// Roots of other locations strictly below `location`'s root.
fn nested_roots(location: &Location, all: &[Location]) -> Vec<PathBuf> {
    all.iter()
        .filter(|other| other.root != location.root && other.root.starts_with(&location.root))
        .map(|other| other.root.clone())
        .collect()
}

fn send(progress: Option<&Sender<ScanProgress>>, msg: ScanProgress) {
    if let Some(tx) = progress {
        let _ = tx.send(msg);
    }
}

fn scan_one(
    location: &Location,
    all: &[Location],
    config: &EngineConfig,
    settings: &ClassifierSettings,
    threats: &ThreatIndex,
    progress: Option<&Sender<ScanProgress>>,
    cancel: &AtomicBool,
) -> LocationOutcome {
    let name = location.name.to_string();
    let access = probe_access(&location.root);
    let probe = ProbeReport {
        name: name.clone(),
        root: location.root.clone(),
        access: access.clone(),
        elevated: crate::platform::is_elevated(),
    };
    let mut outcome = LocationOutcome {
        results: Vec::new(),
        warnings: Vec::new(),
        probe,
        inaccessible: 0,
        access_errors: Vec::new(),
        completed: false,
    };

    match access {
        AccessClass::Accessible { .. } => {}
        AccessClass::Absent => {
            debug!("Skipping absent location {}", location.root.display());
            outcome.completed = true;
            return outcome;
        }
        AccessClass::Denied { reason } => {
            let warning = ScanWarning::RootUnavailable {
                location: name,
                root: location.root.clone(),
                reason,
            };
            warn!("{warning}");
            send(progress, ScanProgress::Warning(warning.clone()));
            outcome.warnings.push(warning);
            outcome.completed = true;
            return outcome;
        }
    }

    if cancel.load(Ordering::Relaxed) {
        return outcome;
    }

    send(
        progress,
        ScanProgress::LocationStarted {
            name: name.clone(),
            root: location.root.clone(),
        },
    );

    // Never offer the quarantine's own payloads for cleaning.
    let mut excluded = nested_roots(location, all);
    if config.quarantine_dir.starts_with(&location.root) {
        excluded.push(config.quarantine_dir.clone());
    }
    let walker = LocationWalker::new(location, config.max_depth, config.max_entries_per_location)
        .with_excluded(excluded);
    let mut candidates = walker.candidates();
    let mut classifier = Classifier::new(location, threats, settings);
    let mut seen: u64 = 0;
    for candidate in candidates.by_ref() {
        classifier.push(candidate);
        seen += 1;
        if seen.is_multiple_of(CANCEL_CHECK_INTERVAL) && cancel.load(Ordering::Relaxed) {
            debug!("Scan of {} cancelled", location.root.display());
            return outcome;
        }
    }
    let summary: WalkSummary = candidates.into_summary();

    let results = classifier.finish(cancel);
    if cancel.load(Ordering::Relaxed) {
        return outcome;
    }

    for limit in &summary.limits {
        let warning = ScanWarning::TraversalLimitReached {
            location: name.clone(),
            root: location.root.clone(),
            limit: *limit,
        };
        warn!("{warning}");
        send(progress, ScanProgress::Warning(warning.clone()));
        outcome.warnings.push(warning);
    }
    if summary.inaccessible > 0 {
        outcome.warnings.push(ScanWarning::Inaccessible {
            location: name.clone(),
            root: location.root.clone(),
            count: summary.inaccessible,
        });
    }

    send(
        progress,
        ScanProgress::LocationFinished {
            name,
            results: results.len(),
            files: summary.files,
            bytes: summary.bytes,
        },
    );

    outcome.inaccessible = summary.inaccessible;
    outcome.access_errors = summary.denied;
    outcome.results = results;
    outcome.completed = true;
    outcome
}

/// Scan `locations` and classify their contents.
///
/// Locations that finished before a cancellation keep their results; a
/// location interrupted mid-walk contributes nothing.
pub fn scan_locations(
    locations: &[Location],
    config: &EngineConfig,
    threats: &ThreatIndex,
    progress: Option<&Sender<ScanProgress>>,
    cancel: &AtomicBool,
) -> ScanReport {
    let start = Instant::now();
    let settings = ClassifierSettings {
        hasher: ContentHasher::new(config.hash_chunk_size, config.hash_min_size),
        large_file_floor: config.large_file_floor,
    };

    let run = || -> Vec<LocationOutcome> {
        locations
            .par_iter()
            .map(|loc| scan_one(loc, locations, config, &settings, threats, progress, cancel))
            .collect()
    };

    let outcomes = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.scan_workers.max(1))
        .thread_name(|i| format!("diskwarden-scan-{i}"))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(err) => {
            warn!("Could not build scan pool ({err}); using the global pool");
            run()
        }
    };

    let mut report = ScanReport::default();
    for outcome in outcomes {
        report.probes.push(outcome.probe);
        if !outcome.completed {
            continue;
        }
        report.results.extend(outcome.results);
        report.warnings.extend(outcome.warnings);
        report.inaccessible += outcome.inaccessible;
        report.access_errors.extend(outcome.access_errors);
    }
    report.cancelled = cancel.load(Ordering::Relaxed);
    report.duration = start.elapsed();

    info!(
        "Scan finished: {} results, {} warnings in {:?}",
        report.results.len(),
        report.warnings.len(),
        report.duration
    );

    send(
        progress,
        if report.cancelled {
            ScanProgress::Cancelled
        } else {
            ScanProgress::Complete {
                duration: report.duration,
                result_count: report.results.len(),
                warning_count: report.warnings.len(),
            }
        },
    );
    report
}

/// Scan every location in `catalog`.
pub fn scan_system(
    catalog: &LocationCatalog,
    config: &EngineConfig,
    threats: &ThreatIndex,
    progress: Option<&Sender<ScanProgress>>,
    cancel: &AtomicBool,
) -> ScanReport {
    scan_locations(catalog.locations(), config, threats, progress, cancel)
}

/// Scan a path the user picked explicitly. Results are always never-auto.
pub fn scan_user_path(
    path: &Path,
    config: &EngineConfig,
    threats: &ThreatIndex,
    cancel: &AtomicBool,
) -> ScanReport {
    let location = Location::user_selected(path);
    scan_locations(std::slice::from_ref(&location), config, threats, None, cancel)
}

/// Handle to a running or completed background scan.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<ScanReport>>,
}

impl ScanHandle {
    /// Request the scan to stop at the next checkpoint.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Wait for the scan to finish and take its report.
    pub fn join(mut self) -> ScanReport {
        match self.thread.take().map(|t| t.join()) {
            Some(Ok(report)) => report,
            _ => {
                tracing::error!("Scanner thread panicked; returning an empty report");
                ScanReport {
                    cancelled: true,
                    ..ScanReport::default()
                }
            }
        }
    }
}

/// Start a catalog scan on a background thread.
pub fn start_scan(catalog: LocationCatalog, config: EngineConfig, threats: ThreatIndex) -> ScanHandle {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("diskwarden-scanner".into())
        .spawn(move || {
            info!("Starting scan of {} locations", catalog.len());
            scan_system(&catalog, &config, &threats, Some(&progress_tx), &cancel_clone)
        })
        .expect("failed to spawn scanner thread");

    ScanHandle {
        progress_rx,
        cancel_flag,
        thread: Some(thread),
    }
}
