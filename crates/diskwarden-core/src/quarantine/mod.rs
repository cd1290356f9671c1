//! Quarantine store: the reversible holding area that stands in for deletion.
//!
//! Files are moved (never copied and left behind) into a checksum-addressed
//! layout and described by one JSON record each:
//!
//! ```text
//! quarantine/
//! ├── store.json                     # layout descriptor (format + version)
//! ├── objects/
//! │   └── {hh}/{checksum}.{id}       # payload, hh = first two hex chars
//! ├── records/
//! │   └── {id}.json                  # QuarantineItem
//! └── intents/
//!     └── {id}.json                  # written before the move, removed after the record
//! ```
//!
//! Ordering of a quarantine: hash → intent → move → record → drop intent. A
//! crash at any point leaves enough on disk for [`QuarantineStore::open`] to
//! either repair the record or report the payload as an orphan; user data is
//! never silently lost. Metadata writes go through a single writer lock, so
//! concurrent quarantines from the clean pool are safe.
mod fsops;
pub mod record;
mod recovery;

pub use record::{
    CorruptionKind, ItemHealth, ListReport, ListedItem, QuarantineId, QuarantineItem,
    StoreDescriptor,
};
pub use recovery::RecoveryReport;

use crate::error::{QuarantineError, RestoreError};
use crate::hasher::{ContentHash, ContentHasher};
use crate::model::Category;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

const OBJECTS_DIR: &str = "objects";
const RECORDS_DIR: &str = "records";
const INTENTS_DIR: &str = "intents";
const DESCRIPTOR_FILE: &str = "store.json";

#[derive(Debug)]
pub struct QuarantineStore {
    root: PathBuf,
    hasher: ContentHasher,
    /// Records by id.
    index: RwLock<BTreeMap<QuarantineId, QuarantineItem>>,
    /// Items that failed an integrity check; not restorable until resolved.
    corrupt: RwLock<HashMap<QuarantineId, CorruptionKind>>,
    /// Payload (length, mtime) at the last successful checksum verification.
    verified: Mutex<HashMap<QuarantineId, (u64, Option<SystemTime>)>>,
    /// Single-writer lock for records, intents and payload removal.
    writer: Mutex<()>,
    recovery: RecoveryReport,
}

impl QuarantineStore {
    /// Open (creating if needed) the store at `root` and run crash recovery.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, QuarantineError> {
        Self::open_with_hasher(root, ContentHasher::default())
    }

    pub fn open_with_hasher(
        root: impl Into<PathBuf>,
        hasher: ContentHasher,
    ) -> Result<Self, QuarantineError> {
        let root = root.into();
        let unavailable = |reason: String| QuarantineError::StoreUnavailable {
            path: root.clone(),
            reason,
        };

        for dir in [OBJECTS_DIR, RECORDS_DIR, INTENTS_DIR] {
            std::fs::create_dir_all(root.join(dir))
                .map_err(|e| unavailable(format!("cannot create {dir}/: {e}")))?;
        }

        let descriptor_path = root.join(DESCRIPTOR_FILE);
        match std::fs::read(&descriptor_path) {
            Ok(bytes) => {
                let descriptor: StoreDescriptor = serde_json::from_slice(&bytes)
                    .map_err(|e| unavailable(format!("unreadable {DESCRIPTOR_FILE}: {e}")))?;
                if !descriptor.is_compatible() {
                    return Err(unavailable(format!(
                        "unsupported layout {} v{}",
                        descriptor.format, descriptor.version
                    )));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fsops::write_json_atomic(&descriptor_path, &StoreDescriptor::current())
                    .map_err(|e| unavailable(format!("cannot write {DESCRIPTOR_FILE}: {e}")))?;
            }
            Err(e) => return Err(unavailable(format!("cannot read {DESCRIPTOR_FILE}: {e}"))),
        }

        let mut store = Self {
            root,
            hasher,
            index: RwLock::new(BTreeMap::new()),
            corrupt: RwLock::new(HashMap::new()),
            verified: Mutex::new(HashMap::new()),
            writer: Mutex::new(()),
            recovery: RecoveryReport::default(),
        };
        store.recovery = store.recover();
        debug!(
            count = store.len(),
            root = %store.root.display(),
            "Opened quarantine store"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    /// What recovery found when the store was opened.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn get(&self, id: &QuarantineId) -> Option<QuarantineItem> {
        self.index.read().get(id).cloned()
    }

    fn payload_path(&self, checksum: &ContentHash, id: &QuarantineId) -> PathBuf {
        let hex = checksum.to_hex();
        self.root
            .join(OBJECTS_DIR)
            .join(&hex[..2])
            .join(format!("{hex}.{id}"))
    }

    fn record_path(&self, id: &QuarantineId) -> PathBuf {
        self.root.join(RECORDS_DIR).join(format!("{id}.json"))
    }

    fn intent_path(&self, id: &QuarantineId) -> PathBuf {
        self.root.join(INTENTS_DIR).join(format!("{id}.json"))
    }

    /// Verify the store can accept writes. A failure here aborts a whole clean.
    pub fn check_writable(&self) -> Result<(), QuarantineError> {
        let probe = self.root.join(INTENTS_DIR).join(".write-probe");
        std::fs::write(&probe, b"ok")
            .and_then(|_| std::fs::remove_file(&probe))
            .map_err(|e| QuarantineError::StoreUnavailable {
                path: self.root.clone(),
                reason: e.to_string(),
            })
    }

    /// Move `path` into quarantine and record it.
    ///
    /// The record is written only after the move succeeded. On any error the
    /// original file is left where it was.
    pub fn quarantine(
        &self,
        path: &Path,
        category: Category,
        metadata: BTreeMap<String, String>,
    ) -> Result<QuarantineItem, QuarantineError> {
        // Records hold absolute paths so a restore does not depend on the cwd.
        let absolute = std::path::absolute(path).map_err(|e| QuarantineError::MoveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let path = absolute.as_path();
        let before = std::fs::symlink_metadata(path).map_err(|e| QuarantineError::MoveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !before.is_file() {
            return Err(QuarantineError::NotARegularFile {
                path: path.to_path_buf(),
            });
        }

        let checksum = self.hasher.hash_file(path)?;
        let quarantined_at = Utc::now();
        let id = QuarantineId::derive(&checksum, path, quarantined_at);
        let mut item = QuarantineItem {
            id: id.clone(),
            original_path: path.to_path_buf(),
            storage_path: self.payload_path(&checksum, &id),
            size: before.len(),
            checksum,
            quarantined_at,
            category,
            metadata,
        };

        let intent = self.intent_path(&id);
        {
            let _w = self.writer.lock();
            fsops::write_json_atomic(&intent, &item).map_err(|e| QuarantineError::Metadata {
                path: intent.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Err(e) = fsops::move_into_store(path, &item.storage_path, &checksum, &self.hasher) {
            let _w = self.writer.lock();
            let _ = std::fs::remove_file(&intent);
            return Err(QuarantineError::MoveFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }

        // The file may have been written between hashing and the move.
        // Rename preserves length and mtime, so a match means the hash stands.
        let after = std::fs::metadata(&item.storage_path)?;
        if after.len() != before.len() || after.modified().ok() != before.modified().ok() {
            let actual = self.hasher.hash_file(&item.storage_path)?;
            if actual != item.checksum {
                let renamed = self.payload_path(&actual, &id);
                if let Some(parent) = renamed.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&item.storage_path, &renamed)?;
                warn!(
                    quarantine_id = %id,
                    "Content changed while quarantining {}; re-addressed",
                    path.display()
                );
                item.checksum = actual;
                item.storage_path = renamed;
            }
            item.size = after.len();
        }

        {
            let _w = self.writer.lock();
            let record = self.record_path(&id);
            fsops::write_json_atomic(&record, &item).map_err(|e| QuarantineError::Metadata {
                path: record,
                reason: e.to_string(),
            })?;
            let _ = std::fs::remove_file(&intent);
            self.index.write().insert(id.clone(), item.clone());
        }

        info!(
            quarantine_id = %id,
            checksum = %item.checksum,
            size = item.size,
            "Quarantined {}",
            path.display()
        );
        Ok(item)
    }

    /// Move an item back to its original path.
    ///
    /// Refuses (never resolves) conflicts: a missing parent directory, an
    /// occupied original path, or a payload whose checksum no longer matches.
    pub fn restore(&self, id: &QuarantineId) -> Result<QuarantineItem, RestoreError> {
        let _w = self.writer.lock();

        let item = self
            .index
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RestoreError::NotFound { id: id.to_string() })?;

        if let Some(kind) = self.corrupt.read().get(id) {
            return Err(RestoreError::Corrupt {
                id: id.to_string(),
                reason: kind.to_string(),
            });
        }

        let actual = match self.hasher.hash_file(&item.storage_path) {
            Ok(actual) => actual,
            Err(err) => {
                let kind = if err.source.kind() == ErrorKind::NotFound {
                    CorruptionKind::PayloadMissing
                } else {
                    CorruptionKind::Unreadable {
                        reason: err.source.to_string(),
                    }
                };
                let reason = kind.to_string();
                self.mark_corrupt(id, kind);
                return Err(RestoreError::Corrupt {
                    id: id.to_string(),
                    reason,
                });
            }
        };
        if actual != item.checksum {
            self.mark_corrupt(
                id,
                CorruptionKind::ChecksumMismatch {
                    expected: item.checksum.to_hex(),
                    actual: actual.to_hex(),
                },
            );
            return Err(RestoreError::ChecksumMismatch {
                id: id.to_string(),
                expected: item.checksum.to_hex(),
                actual: actual.to_hex(),
            });
        }

        if let Some(parent) = item.original_path.parent() {
            if !parent.is_dir() {
                return Err(RestoreError::ParentMissing {
                    parent: parent.to_path_buf(),
                });
            }
        }
        if std::fs::symlink_metadata(&item.original_path).is_ok() {
            return Err(RestoreError::Occupied {
                path: item.original_path.clone(),
            });
        }

        fsops::move_out_no_clobber(
            &item.storage_path,
            &item.original_path,
            &item.checksum,
            &self.hasher,
        )
        .map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                RestoreError::Occupied {
                    path: item.original_path.clone(),
                }
            } else {
                RestoreError::Io(e)
            }
        })?;

        if let Err(e) = std::fs::remove_file(self.record_path(id)) {
            // The payload is gone, so a leftover record would read as corrupt.
            warn!(quarantine_id = %id, "Restored but could not remove record: {e}");
        }
        self.forget(id);

        info!(quarantine_id = %id, "Restored {}", item.original_path.display());
        Ok(item)
    }

    /// Permanently erase items quarantined at least `older_than_days` ago.
    ///
    /// Irreversible. Returns the number of items fully erased; items whose
    /// payload or record cannot be removed are kept and logged.
    pub fn purge(&self, older_than_days: u64) -> Result<usize, QuarantineError> {
        let _w = self.writer.lock();
        let victims = self.due_for_purge(older_than_days);

        let mut purged = 0;
        for item in victims {
            match std::fs::remove_file(&item.storage_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(quarantine_id = %item.id, "Cannot purge payload: {e}");
                    continue;
                }
            }
            match std::fs::remove_file(self.record_path(&item.id)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    // Stays indexed; the next purge retries the record.
                    warn!(quarantine_id = %item.id, "Payload erased but record kept: {e}");
                    continue;
                }
            }
            if let Some(shard) = item.storage_path.parent() {
                // Only succeeds once the shard directory is empty.
                let _ = std::fs::remove_dir(shard);
            }
            self.forget(&item.id);
            purged += 1;
        }

        info!("Purged {purged} quarantine items older than {older_than_days} days");
        Ok(purged)
    }

    /// Items that `purge(older_than_days)` would erase.
    pub fn due_for_purge(&self, older_than_days: u64) -> Vec<QuarantineItem> {
        let cutoff = Utc::now() - ChronoDuration::days(older_than_days.min(1_000_000) as i64);
        self.index
            .read()
            .values()
            .filter(|item| item.quarantined_at <= cutoff)
            .cloned()
            .collect()
    }

    /// Enumerate holdings, newest first, with an integrity check of each.
    ///
    /// Checksums are re-verified only when a payload's length or mtime
    /// changed since its last verification.
    pub fn list(&self) -> ListReport {
        let mut items: Vec<QuarantineItem> = self.index.read().values().cloned().collect();
        items.sort_by(|a, b| {
            b.quarantined_at
                .cmp(&a.quarantined_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut report = ListReport::default();
        for item in items {
            let health = self.check_item(&item);
            if let ItemHealth::Corrupt(kind) = &health {
                report.warnings.push(format!(
                    "{} ({}): {kind}",
                    item.id,
                    item.original_path.display()
                ));
            }
            report.items.push(ListedItem { item, health });
        }

        report.orphans = self.find_orphans();
        for orphan in &report.orphans {
            report
                .warnings
                .push(format!("orphaned payload without record: {}", orphan.display()));
        }
        report
    }

    fn check_item(&self, item: &QuarantineItem) -> ItemHealth {
        let meta = match std::fs::metadata(&item.storage_path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return self.mark_corrupt(&item.id, CorruptionKind::PayloadMissing)
            }
            Err(e) => {
                return self.mark_corrupt(
                    &item.id,
                    CorruptionKind::Unreadable {
                        reason: e.to_string(),
                    },
                )
            }
        };
        if meta.len() != item.size {
            return self.mark_corrupt(
                &item.id,
                CorruptionKind::SizeMismatch {
                    expected: item.size,
                    actual: meta.len(),
                },
            );
        }

        let stamp = (meta.len(), meta.modified().ok());
        if self.verified.lock().get(&item.id) == Some(&stamp) {
            return ItemHealth::Intact;
        }

        match self.hasher.hash_file(&item.storage_path) {
            Ok(actual) if actual == item.checksum => {
                self.verified.lock().insert(item.id.clone(), stamp);
                self.corrupt.write().remove(&item.id);
                ItemHealth::Intact
            }
            Ok(actual) => self.mark_corrupt(
                &item.id,
                CorruptionKind::ChecksumMismatch {
                    expected: item.checksum.to_hex(),
                    actual: actual.to_hex(),
                },
            ),
            Err(err) => self.mark_corrupt(
                &item.id,
                CorruptionKind::Unreadable {
                    reason: err.source.to_string(),
                },
            ),
        }
    }

    fn mark_corrupt(&self, id: &QuarantineId, kind: CorruptionKind) -> ItemHealth {
        warn!(quarantine_id = %id, "Corruption detected: {kind}");
        self.verified.lock().remove(id);
        self.corrupt.write().insert(id.clone(), kind.clone());
        ItemHealth::Corrupt(kind)
    }

    fn forget(&self, id: &QuarantineId) {
        self.index.write().remove(id);
        self.corrupt.write().remove(id);
        self.verified.lock().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_in(tmp: &tempfile::TempDir) -> QuarantineStore {
        QuarantineStore::open(tmp.path().join("q")).unwrap()
    }

    fn quarantine_file(store: &QuarantineStore, path: &Path, body: &[u8]) -> QuarantineItem {
        fs::write(path, body).unwrap();
        store
            .quarantine(path, Category::Cache, BTreeMap::new())
            .unwrap()
    }

    #[test]
    fn open_writes_descriptor() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let bytes = fs::read(store.root().join(DESCRIPTOR_FILE)).unwrap();
        let d: StoreDescriptor = serde_json::from_slice(&bytes).unwrap();
        assert!(d.is_compatible());
        assert!(store.is_empty());
    }

    #[test]
    fn incompatible_descriptor_is_refused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("q");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join(DESCRIPTOR_FILE),
            br#"{"format":"something-else","version":9,"created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(
            QuarantineStore::open(&root),
            Err(QuarantineError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn quarantine_moves_and_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let file = tmp.path().join("cache.bin");
        let item = quarantine_file(&store, &file, b"cached bytes");

        assert!(!file.exists());
        assert!(item.storage_path.exists());
        assert!(item
            .storage_path
            .to_string_lossy()
            .contains(&item.checksum.to_hex()));
        assert!(store.record_path(&item.id).exists());
        assert!(!store.intent_path(&item.id).exists());
        assert_eq!(store.get(&item.id), Some(item));
    }

    #[test]
    fn directories_are_refused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();
        assert!(matches!(
            store.quarantine(&dir, Category::Temp, BTreeMap::new()),
            Err(QuarantineError::NotARegularFile { .. })
        ));
        assert!(dir.exists());
    }

    #[test]
    fn restore_refuses_occupied_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let file = tmp.path().join("a.txt");
        let item = quarantine_file(&store, &file, b"original");
        fs::write(&file, b"someone else").unwrap();

        assert!(matches!(
            store.restore(&item.id),
            Err(RestoreError::Occupied { .. })
        ));
        assert_eq!(fs::read(&file).unwrap(), b"someone else");
        assert!(store.get(&item.id).is_some());
    }

    #[test]
    fn restore_refuses_missing_parent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let dir = tmp.path().join("gone");
        fs::create_dir(&dir).unwrap();
        let item = quarantine_file(&store, &dir.join("a.txt"), b"x");
        fs::remove_dir(&dir).unwrap();

        assert!(matches!(
            store.restore(&item.id),
            Err(RestoreError::ParentMissing { .. })
        ));
    }

    #[test]
    fn tampered_payload_is_corrupt() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let file = tmp.path().join("a.txt");
        let item = quarantine_file(&store, &file, b"original");
        fs::write(&item.storage_path, b"tampered").unwrap();

        let listing = store.list();
        assert!(!listing.items[0].is_restorable());
        assert_eq!(listing.warnings.len(), 1);
        assert!(matches!(
            store.restore(&item.id),
            Err(RestoreError::Corrupt { .. })
        ));
        assert!(!file.exists());
    }

    #[test]
    fn restore_detects_checksum_mismatch_without_listing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let item = quarantine_file(&store, &tmp.path().join("a.txt"), b"original");
        fs::write(&item.storage_path, b"tampered").unwrap();

        assert!(matches!(
            store.restore(&item.id),
            Err(RestoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn purge_respects_age() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let item = quarantine_file(&store, &tmp.path().join("a"), b"a");

        assert_eq!(store.purge(30).unwrap(), 0);
        assert!(store.get(&item.id).is_some());

        assert_eq!(store.purge(0).unwrap(), 1);
        assert!(!item.storage_path.exists());
        assert!(store.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn purge_keeps_going_when_a_record_is_stuck() {
        use std::os::unix::fs::PermissionsExt;

        // Root ignores permission bits.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let item = quarantine_file(&store, &tmp.path().join("a"), b"a");
        let records = store.root().join(RECORDS_DIR);
        fs::set_permissions(&records, fs::Permissions::from_mode(0o500)).unwrap();

        let first = store.purge(0);
        fs::set_permissions(&records, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(first.unwrap(), 0);
        assert!(!item.storage_path.exists());
        assert!(store.get(&item.id).is_some());
        assert!(matches!(
            store.list().items[0].health,
            ItemHealth::Corrupt(CorruptionKind::PayloadMissing)
        ));

        assert_eq!(store.purge(0).unwrap(), 1);
        assert!(!store.record_path(&item.id).exists());
        assert!(store.is_empty());
    }

    #[test]
    fn list_reports_orphans() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(&tmp);
        let sum = ContentHash::of_bytes(b"stray");
        let id = QuarantineId::derive(&sum, Path::new("/lost"), Utc::now());
        let stray = store.payload_path(&sum, &id);
        fs::create_dir_all(stray.parent().unwrap()).unwrap();
        fs::write(&stray, b"stray").unwrap();

        let listing = store.list();
        assert!(listing.items.is_empty());
        assert_eq!(listing.orphans, vec![stray]);
    }
}
