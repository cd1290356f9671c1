/// Crash recovery, run once when a store is opened.
///
/// A quarantine writes, in order: intent, payload, record, then removes the
/// intent. Whatever survives a crash is reconciled here:
///
/// | intent | payload | record | action                                      |
/// |--------|---------|--------|---------------------------------------------|
/// | yes    | yes     | no     | re-hash payload, promote intent to record   |
/// | yes    | no      | no     | original untouched (or lost); drop intent   |
/// | yes    | any     | yes    | stale intent; drop it                       |
/// | no     | yes     | no     | orphan; kept on disk and reported           |
/// | no     | no      | yes    | record flagged corrupt (payload missing)    |
///
/// `.partial` files are interrupted copies whose source was never unlinked,
/// so they are removed.
use super::fsops::{self, is_partial};
use super::record::{CorruptionKind, QuarantineId, QuarantineItem};
use super::{QuarantineStore, INTENTS_DIR, OBJECTS_DIR, RECORDS_DIR};
use serde::Serialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What [`QuarantineStore::open`] found and fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Intents promoted to records because their payload had landed.
    pub repaired: Vec<QuarantineId>,
    /// Intents dropped because the move never happened or already completed.
    pub discarded_intents: Vec<QuarantineId>,
    /// Intents whose file is in neither place.
    pub lost: Vec<PathBuf>,
    /// Payloads with no record; not restorable, never deleted automatically.
    pub orphans: Vec<PathBuf>,
    /// Records whose payload is gone.
    pub missing_payloads: Vec<QuarantineId>,
    /// Record or intent files that could not be parsed; left in place.
    pub unreadable: Vec<PathBuf>,
    pub partials_removed: usize,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self == &Self::default()
    }
}

/// `*.json` files directly under `dir`, with `.partial` leftovers removed.
fn json_files(dir: &Path, report: &mut RecoveryReport) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if is_partial(&path) {
            if std::fs::remove_file(&path).is_ok() {
                report.partials_removed += 1;
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    files
}

fn read_item(path: &Path) -> Option<QuarantineItem> {
    let bytes = std::fs::read(path).ok()?;
    let item: QuarantineItem = serde_json::from_slice(&bytes).ok()?;
    // The file name is the id; a mismatch means the file was tampered with.
    let stem = path.file_stem()?.to_string_lossy();
    (item.id.is_well_formed() && item.id.as_str() == stem).then_some(item)
}

impl QuarantineStore {
    pub(super) fn recover(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        {
            let mut index = self.index.write();
            for path in json_files(&self.root.join(RECORDS_DIR), &mut report) {
                match read_item(&path) {
                    Some(item) => {
                        index.insert(item.id.clone(), item);
                    }
                    None => {
                        warn!("Unreadable quarantine record {}", path.display());
                        report.unreadable.push(path);
                    }
                }
            }
        }

        for path in json_files(&self.root.join(INTENTS_DIR), &mut report) {
            let Some(mut item) = read_item(&path) else {
                warn!("Unreadable quarantine intent {}", path.display());
                report.unreadable.push(path);
                continue;
            };

            if self.index.read().contains_key(&item.id) {
                let _ = std::fs::remove_file(&path);
                report.discarded_intents.push(item.id);
                continue;
            }

            match self.hasher.hash_file(&item.storage_path) {
                Ok(actual) => {
                    if actual != item.checksum {
                        warn!(
                            quarantine_id = %item.id,
                            "Payload differs from intent checksum; recording actual content"
                        );
                        item.checksum = actual;
                    }
                    if let Ok(meta) = std::fs::metadata(&item.storage_path) {
                        item.size = meta.len();
                    }
                    let record = self.record_path(&item.id);
                    match fsops::write_json_atomic(&record, &item) {
                        Ok(()) => {
                            let _ = std::fs::remove_file(&path);
                            info!(
                                quarantine_id = %item.id,
                                "Recovered interrupted quarantine of {}",
                                item.original_path.display()
                            );
                            report.repaired.push(item.id.clone());
                            self.index.write().insert(item.id.clone(), item);
                        }
                        Err(e) => {
                            warn!(quarantine_id = %item.id, "Cannot write recovered record: {e}");
                        }
                    }
                }
                Err(err) if err.source.kind() == ErrorKind::NotFound => {
                    if std::fs::symlink_metadata(&item.original_path).is_err() {
                        warn!(
                            quarantine_id = %item.id,
                            "{} is neither at its original path nor in quarantine",
                            item.original_path.display()
                        );
                        report.lost.push(item.original_path.clone());
                    }
                    let _ = std::fs::remove_file(&path);
                    report.discarded_intents.push(item.id);
                }
                Err(err) => {
                    warn!(quarantine_id = %item.id, "Cannot verify interrupted payload: {err}");
                    report.unreadable.push(path);
                }
            }
        }

        for item in self.index.read().values() {
            if !item.storage_path.exists() {
                warn!(quarantine_id = %item.id, "Payload missing for record");
                report.missing_payloads.push(item.id.clone());
            }
        }
        for id in &report.missing_payloads {
            self.corrupt
                .write()
                .insert(id.clone(), CorruptionKind::PayloadMissing);
        }

        report.orphans = self.find_orphans();
        for orphan in &report.orphans {
            warn!("Orphaned quarantine payload {}", orphan.display());
        }

        if !report.is_clean() {
            info!(
                repaired = report.repaired.len(),
                orphans = report.orphans.len(),
                missing = report.missing_payloads.len(),
                "Quarantine recovery finished"
            );
        }
        report
    }

    /// Payload files that no record or pending intent refers to.
    pub(super) fn find_orphans(&self) -> Vec<PathBuf> {
        let mut referenced: HashSet<PathBuf> = self
            .index
            .read()
            .values()
            .map(|item| item.storage_path.clone())
            .collect();
        if let Ok(intents) = std::fs::read_dir(self.root.join(INTENTS_DIR)) {
            for entry in intents.flatten() {
                if let Some(item) = read_item(&entry.path()) {
                    referenced.insert(item.storage_path);
                }
            }
        }

        let mut orphans = Vec::new();
        let Ok(shards) = std::fs::read_dir(self.root.join(OBJECTS_DIR)) else {
            return orphans;
        };
        for shard in shards.flatten() {
            let Ok(payloads) = std::fs::read_dir(shard.path()) else {
                continue;
            };
            for payload in payloads.flatten() {
                let path = payload.path();
                if is_partial(&path) || referenced.contains(&path) {
                    continue;
                }
                debug!("Unreferenced payload {}", path.display());
                orphans.push(path);
            }
        }
        orphans.sort();
        orphans
    }
}
