/// Bounded directory walker producing [`Candidate`]s for one location.
///
/// The walk is lazy: candidates are yielded as `jwalk` reads directories, so
/// memory is bounded by the caller rather than by the size of the tree.
/// Calling [`LocationWalker::candidates`] again restarts the walk from the root.
///
/// Limits:
/// - `max_depth` stops descent below that many levels; a directory left
///   unexplored is reported as a depth limit.
/// - `max_entries` caps files plus directories visited; the walk ends there
///   and the summary records the cap.
///
/// Symlinks are never followed. Entries that fail to `stat` (deleted during
/// the walk, permission denied) are counted as inaccessible and skipped.
use crate::error::AccessError;
use crate::model::{Candidate, Location};
use jwalk::{DirEntryIter, Parallelism, WalkDir};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Which traversal cap was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalLimit {
    Depth(usize),
    Entries(usize),
}

impl fmt::Display for TraversalLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depth(n) => write!(f, "depth limit of {n}"),
            Self::Entries(n) => write!(f, "entry limit of {n}"),
        }
    }
}

/// Counters accumulated while walking one location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Files and directories visited below the root.
    pub entries_visited: u64,
    pub files: u64,
    pub bytes: u64,
    /// Entries or directories that could not be read.
    pub inaccessible: u64,
    pub symlinks_skipped: u64,
    /// Caps hit during the walk, in the order they were first hit.
    pub limits: Vec<TraversalLimit>,
    /// The first few unreadable paths, for diagnostics.
    pub denied: Vec<AccessError>,
}

/// Unreadable paths kept per location; the rest are only counted.
const MAX_DENIED_SAMPLES: usize = 32;

impl WalkSummary {
    fn note_inaccessible(&mut self, path: &Path, reason: String) {
        self.inaccessible += 1;
        if self.denied.len() < MAX_DENIED_SAMPLES {
            self.denied.push(AccessError {
                path: path.to_path_buf(),
                reason,
            });
        }
    }

    fn note_limit(&mut self, limit: TraversalLimit) {
        if !self.limits.contains(&limit) {
            self.limits.push(limit);
        }
    }
}

/// Walk configuration for one location.
#[derive(Debug, Clone)]
pub struct LocationWalker<'a> {
    location: &'a Location,
    max_depth: usize,
    max_entries: usize,
    /// Roots of other locations nested below this one; pruned so their files
    /// are not counted twice.
    excluded: Arc<Vec<PathBuf>>,
}

impl<'a> LocationWalker<'a> {
    pub fn new(location: &'a Location, max_depth: usize, max_entries: usize) -> Self {
        Self {
            location,
            max_depth: max_depth.max(1),
            max_entries,
            excluded: Arc::new(Vec::new()),
        }
    }

    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = Arc::new(excluded);
        self
    }

    /// Start (or restart) the walk.
    pub fn candidates(&self) -> CandidateIter<'a> {
        let excluded = self.excluded.clone();
        let walker = WalkDir::new(&self.location.root)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true)
            .max_depth(self.max_depth)
            .parallelism(Parallelism::Serial)
            .process_read_dir(move |_depth, _path, _state, children| {
                if excluded.is_empty() {
                    return;
                }
                children.retain(|child| match child {
                    Ok(entry) => !excluded.iter().any(|ex| entry.path() == *ex),
                    Err(_) => true,
                });
            });

        CandidateIter {
            location: self.location,
            inner: walker.into_iter(),
            max_depth: self.max_depth,
            max_entries: self.max_entries,
            summary: WalkSummary::default(),
            finished: false,
        }
    }
}

/// Lazy candidate sequence for one location.
pub struct CandidateIter<'a> {
    location: &'a Location,
    inner: DirEntryIter<((), ())>,
    max_depth: usize,
    max_entries: usize,
    summary: WalkSummary,
    finished: bool,
}

impl CandidateIter<'_> {
    /// Counters so far. Final once the iterator returns `None`.
    pub fn summary(&self) -> &WalkSummary {
        &self.summary
    }

    pub fn into_summary(self) -> WalkSummary {
        self.summary
    }
}

impl<'a> Iterator for CandidateIter<'a> {
    type Item = Candidate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let entry = match self.inner.next() {
                None => {
                    self.finished = true;
                    break;
                }
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    // jwalk errors are unreadable directories.
                    debug!("Skipping unreadable entry: {err}");
                    let path = err.path().unwrap_or(&self.location.root).to_path_buf();
                    self.summary.note_inaccessible(&path, err.to_string());
                    continue;
                }
            };

            // The root itself is not a candidate.
            if entry.depth == 0 {
                continue;
            }

            self.summary.entries_visited += 1;
            if self.summary.entries_visited > self.max_entries as u64 {
                self.summary.entries_visited -= 1;
                self.summary
                    .note_limit(TraversalLimit::Entries(self.max_entries));
                self.finished = true;
                debug!(
                    "Entry limit {} reached in {}",
                    self.max_entries,
                    self.location.root.display()
                );
                break;
            }

            let file_type = entry.file_type();
            let path = entry.path();

            if file_type.is_symlink() {
                self.summary.symlinks_skipped += 1;
                continue;
            }

            if file_type.is_dir() {
                if entry.depth >= self.max_depth && has_children(&path) {
                    self.summary.note_limit(TraversalLimit::Depth(self.max_depth));
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let meta = match std::fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    debug!("Cannot stat {}: {err}", path.display());
                    self.summary.note_inaccessible(&path, err.to_string());
                    continue;
                }
            };

            self.summary.files += 1;
            self.summary.bytes += meta.len();
            return Some(Candidate {
                path,
                size: meta.len(),
                modified: meta.modified().ok(),
                accessed: meta.accessed().ok(),
                location: self.location,
            });
        }
        None
    }
}

fn has_children(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut it| it.next().is_some())
        .unwrap_or(false)
}

/// Approximate size of a location from its first `sample_limit` entries.
///
/// Diagnostic only: used to explain what a location roughly holds without a
/// full walk. Scan results are always computed by exact aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub sampled_files: u64,
    pub sampled_bytes: u64,
    /// `true` when the sample limit cut the walk short, so the real size is larger.
    pub truncated: bool,
}

pub fn estimate_location(location: &Location, max_depth: usize, sample_limit: usize) -> SizeEstimate {
    let mut iter = LocationWalker::new(location, max_depth, sample_limit).candidates();
    for _ in iter.by_ref() {}
    let summary = iter.into_summary();
    SizeEstimate {
        sampled_files: summary.files,
        sampled_bytes: summary.bytes,
        truncated: summary
            .limits
            .iter()
            .any(|l| matches!(l, TraversalLimit::Entries(_))),
    }
}
