/// Classifier: turns one location's candidates into [`ScanResult`]s.
///
/// Candidates are pushed one at a time as the walker yields them, so bucket
/// totals stream without keeping a per-file list beyond what cleaning needs.
/// Calling [`Classifier::finish`] runs the batch steps (duplicate hashing,
/// large-file selection) and produces the results.
///
/// Routing of each candidate:
/// - flagged by a threat detection → its own result, verdict raised;
/// - location has a bucket category → summed into one result for the bucket;
/// - user-content location → duplicate grouping, then large-file selection;
///   anything else there is user data and is not proposed.
pub mod duplicates;
pub mod safety;

use crate::hasher::ContentHasher;
use crate::model::size::{files_phrase, format_size};
use crate::model::{Candidate, Category, Location, ResultId, ScanResult, ThreatDetection};
use chrono::{DateTime, Utc};
use duplicates::{find_duplicates, DedupInput};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Threat detections indexed by path.
#[derive(Debug, Clone, Default)]
pub struct ThreatIndex {
    by_path: HashMap<PathBuf, ThreatDetection>,
}

impl ThreatIndex {
    pub fn new(detections: impl IntoIterator<Item = ThreatDetection>) -> Self {
        Self {
            by_path: detections
                .into_iter()
                .map(|t| (t.path.clone(), t))
                .collect(),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&ThreatDetection> {
        self.by_path.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Thresholds the classifier needs from the engine configuration.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub hasher: ContentHasher,
    pub large_file_floor: u64,
}

#[derive(Debug, Default)]
struct Bucket {
    paths: Vec<PathBuf>,
    total_size: u64,
}

pub struct Classifier<'a> {
    location: &'a Location,
    threats: &'a ThreatIndex,
    settings: &'a ClassifierSettings,
    scanned_at: DateTime<Utc>,
    bucket: Bucket,
    content: Vec<DedupInput>,
    flagged: Vec<(DedupInput, ThreatDetection)>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        location: &'a Location,
        threats: &'a ThreatIndex,
        settings: &'a ClassifierSettings,
    ) -> Self {
        Self {
            location,
            threats,
            settings,
            scanned_at: Utc::now(),
            bucket: Bucket::default(),
            content: Vec::new(),
            flagged: Vec::new(),
        }
    }

    pub fn push(&mut self, candidate: Candidate<'_>) {
        let input = DedupInput {
            path: candidate.path,
            size: candidate.size,
            modified: candidate.modified,
        };

        if let Some(threat) = self.threats.get(&input.path) {
            self.flagged.push((input, threat.clone()));
            return;
        }

        if self.location.category.is_some() {
            self.bucket.total_size += input.size;
            self.bucket.paths.push(input.path);
            return;
        }

        // User content: keep only what could become a duplicate or large result.
        if self.settings.hasher.is_eligible(input.size) || input.size >= self.settings.large_file_floor {
            self.content.push(input);
        }
    }

    /// Produce the results for this location.
    ///
    /// Cancellation is honoured between files while hashing; the results
    /// then cover only what was hashed before the signal.
    pub fn finish(self, cancel: &AtomicBool) -> Vec<ScanResult> {
        let mut results = Vec::new();

        if let Some(category) = self.location.category {
            if !self.bucket.paths.is_empty() {
                results.push(self.bucket_result(category));
            }
        } else {
            let groups = find_duplicates(&self.content, &self.settings.hasher, cancel);
            let grouped: HashSet<&Path> = groups
                .iter()
                .flat_map(|g| g.members.iter().map(|m| m.path.as_path()))
                .collect();

            let mut large: Vec<&DedupInput> = self
                .content
                .iter()
                .filter(|i| i.size >= self.settings.large_file_floor)
                .filter(|i| !grouped.contains(i.path.as_path()))
                .collect();
            large.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
            let large_results: Vec<ScanResult> =
                large.into_iter().map(|i| self.large_result(i)).collect();

            results.extend(groups.into_iter().map(|g| self.duplicate_result(g)));
            results.extend(large_results);
        }

        for (input, threat) in &self.flagged {
            results.push(self.threat_result(input, threat));
        }

        results
    }

    fn base(&self, category: Category, name: String, representative: PathBuf) -> ScanResult {
        ScanResult {
            id: ResultId::generate(),
            name,
            category,
            total_size: 0,
            file_count: 0,
            representative_path: representative,
            description: String::new(),
            verdict: safety::verdict_for(self.location, None),
            scanned_at: self.scanned_at,
            location_root: self.location.root.clone(),
            paths: Vec::new(),
            duplicate_group: None,
            threat: None,
        }
    }

    fn bucket_result(&self, category: Category) -> ScanResult {
        let count = self.bucket.paths.len() as u64;
        let mut r = self.base(
            category,
            self.location.name.to_string(),
            self.location.root.clone(),
        );
        r.total_size = self.bucket.total_size;
        r.file_count = count;
        r.description = format!(
            "{} — {} — {}",
            self.location.name,
            files_phrase(count),
            format_size(self.bucket.total_size)
        );
        r.paths = self.bucket.paths.clone();
        r
    }

    fn duplicate_result(&self, group: crate::model::DuplicateGroup) -> ScanResult {
        let keeper = group.members[0].path.clone();
        let keeper_name = file_name(&keeper);
        let removable = group.removable();
        let mut r = self.base(
            Category::Duplicate,
            format!("Copies of {keeper_name}"),
            keeper.clone(),
        );
        r.total_size = removable.iter().map(|m| m.size).sum();
        r.file_count = removable.len() as u64;
        r.paths = removable.iter().map(|m| m.path.clone()).collect();
        r.description = format!(
            "{} identical to {} ({} each); keeping the newest at {}",
            files_phrase(r.file_count),
            keeper_name,
            format_size(group.members[0].size),
            keeper.display()
        );
        r.duplicate_group = Some(group);
        r
    }

    fn large_result(&self, input: &DedupInput) -> ScanResult {
        let name = file_name(&input.path);
        let mut r = self.base(Category::Large, name.clone(), input.path.clone());
        r.total_size = input.size;
        r.file_count = 1;
        r.paths = vec![input.path.clone()];
        r.description = format!("Large file {name} ({})", format_size(input.size));
        r
    }

    /// A flagged file outside any bucket has no category of its own; it is
    /// listed with the large files and its description says so when it is
    /// under the large-file floor.
    fn threat_result(&self, input: &DedupInput, threat: &ThreatDetection) -> ScanResult {
        let category = self.location.category.unwrap_or(Category::Large);
        let name = file_name(&input.path);
        let mut r = self.base(category, name.clone(), input.path.clone());
        r.verdict = safety::verdict_for(self.location, Some(threat));
        r.total_size = input.size;
        r.file_count = 1;
        r.paths = vec![input.path.clone()];
        r.description = format!(
            "{name} flagged as {} ({}): {}",
            threat.threat_type, threat.severity, threat.description
        );
        if self.location.category.is_none() && input.size < self.settings.large_file_floor {
            r.description.push_str(&format!(
                "; listed on its own, not because of its size ({})",
                format_size(input.size)
            ));
        }
        r.threat = Some(threat.clone());
        r
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Classify a full candidate sequence in one call.
pub fn classify<'c>(
    location: &Location,
    candidates: impl IntoIterator<Item = Candidate<'c>>,
    threats: &ThreatIndex,
    settings: &ClassifierSettings,
    cancel: &AtomicBool,
) -> Vec<ScanResult> {
    let mut classifier = Classifier::new(location, threats, settings);
    for candidate in candidates {
        classifier.push(candidate);
    }
    classifier.finish(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecommendedAction, SafetyVerdict};
    use std::fs;
    use std::time::{Duration, SystemTime};

    fn settings() -> ClassifierSettings {
        ClassifierSettings {
            hasher: ContentHasher::new(4096, 1024),
            large_file_floor: 10_000,
        }
    }

    fn candidate<'a>(loc: &'a Location, path: PathBuf, size: u64, secs: u64) -> Candidate<'a> {
        Candidate {
            path,
            size,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
            accessed: None,
            location: loc,
        }
    }

    #[test]
    fn bucket_sums_exactly() {
        let loc = Location::bucket("Chrome cache", "/c", Category::Cache, SafetyVerdict::AutoSafe);
        let threats = ThreatIndex::default();
        let s = settings();
        let candidates = (0..3).map(|i| candidate(&loc, PathBuf::from(format!("/c/{i}")), 100 + i, 0));
        let results = classify(&loc, candidates, &threats, &s, &AtomicBool::new(false));

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.category, Category::Cache);
        assert_eq!(r.total_size, 303);
        assert_eq!(r.file_count, 3);
        assert_eq!(r.paths.len(), 3);
        assert_eq!(r.verdict, SafetyVerdict::AutoSafe);
        assert!(r.description.starts_with("Chrome cache — 3 files"));
    }

    #[test]
    fn empty_bucket_yields_nothing() {
        let loc = Location::bucket("c", "/c", Category::Log, SafetyVerdict::AutoSafe);
        let results = classify(
            &loc,
            Vec::<Candidate>::new(),
            &ThreatIndex::default(),
            &settings(),
            &AtomicBool::new(false),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn user_content_yields_duplicates_and_large() {
        let tmp = tempfile::TempDir::new().unwrap();
        let loc = Location::user_content("Downloads", tmp.path());
        let old = tmp.path().join("old.iso");
        let new = tmp.path().join("new.iso");
        let big = tmp.path().join("big.bin");
        let small = tmp.path().join("note.txt");
        fs::write(&old, vec![9u8; 20_000]).unwrap();
        fs::write(&new, vec![9u8; 20_000]).unwrap();
        fs::write(&big, vec![1u8; 30_000]).unwrap();
        fs::write(&small, b"hello").unwrap();

        let s = settings();
        let candidates = vec![
            candidate(&loc, old.clone(), 20_000, 100),
            candidate(&loc, new.clone(), 20_000, 200),
            candidate(&loc, big.clone(), 30_000, 50),
            candidate(&loc, small, 5, 50),
        ];
        let results = classify(&loc, candidates, &ThreatIndex::default(), &s, &AtomicBool::new(false));

        assert_eq!(results.len(), 2);
        let dup = results.iter().find(|r| r.category == Category::Duplicate).unwrap();
        assert_eq!(dup.paths, vec![old]);
        assert_eq!(dup.representative_path, new);
        assert_eq!(dup.total_size, 20_000);
        assert_eq!(dup.verdict, SafetyVerdict::NeedsConfirmation);

        // The duplicates exceed the large floor but are already categorised.
        let large: Vec<_> = results.iter().filter(|r| r.category == Category::Large).collect();
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].paths, vec![big]);
    }

    #[test]
    fn threat_splits_file_out_of_bucket() {
        let loc = Location::bucket("c", "/c", Category::Cache, SafetyVerdict::AutoSafe);
        let threats = ThreatIndex::new(vec![ThreatDetection {
            path: PathBuf::from("/c/bad"),
            threat_type: "trojan".into(),
            severity: "high".into(),
            description: "known sample".into(),
            recommended_action: RecommendedAction::Delete,
        }]);
        let s = settings();
        let candidates = vec![
            candidate(&loc, PathBuf::from("/c/ok"), 10, 0),
            candidate(&loc, PathBuf::from("/c/bad"), 20, 0),
        ];
        let results = classify(&loc, candidates, &threats, &s, &AtomicBool::new(false));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].total_size, 10);
        assert_eq!(results[0].verdict, SafetyVerdict::AutoSafe);
        assert_eq!(results[1].paths, vec![PathBuf::from("/c/bad")]);
        assert_eq!(results[1].verdict, SafetyVerdict::NeverAuto);
        assert!(results[1].threat.is_some());
    }

    #[test]
    fn small_flagged_user_file_is_not_described_as_large() {
        let loc = Location::user_content("Downloads", "/d");
        let threats = ThreatIndex::new(vec![ThreatDetection {
            path: PathBuf::from("/d/tiny.js"),
            threat_type: "dropper".into(),
            severity: "medium".into(),
            description: "script".into(),
            recommended_action: RecommendedAction::Quarantine,
        }]);
        let results = classify(
            &loc,
            vec![candidate(&loc, PathBuf::from("/d/tiny.js"), 5, 0)],
            &threats,
            &settings(),
            &AtomicBool::new(false),
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].total_size, 5);
        assert!(results[0].description.contains("not because of its size (5 B)"));
        assert_eq!(results[0].verdict, SafetyVerdict::NeedsConfirmation);
    }

    #[test]
    fn user_selected_results_are_never_auto() {
        let tmp = tempfile::TempDir::new().unwrap();
        let big = tmp.path().join("big.bin");
        fs::write(&big, vec![0u8; 20_000]).unwrap();
        let loc = Location::user_selected(tmp.path());
        let results = classify(
            &loc,
            vec![candidate(&loc, big, 20_000, 0)],
            &ThreatIndex::default(),
            &settings(),
            &AtomicBool::new(false),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].verdict, SafetyVerdict::NeverAuto);
    }
}
