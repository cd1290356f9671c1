/// Engine facade: the boundary the presentation or transport layer calls.
///
/// Owns the configuration, the location catalog, the threat passthrough and
/// the quarantine store. Nothing else persists between calls.
use crate::catalog::LocationCatalog;
use crate::classify::ThreatIndex;
use crate::cleaner::{self, CleanHandle, CleanPolicy};
use crate::config::EngineConfig;
use crate::error::{CleanError, QuarantineError, RestoreError};
use crate::model::{CleanProgress, CleanResult, ScanResult, ThreatDetection};
use crate::platform::{probe_catalog, ProbeReport};
use crate::quarantine::{ListReport, QuarantineId, QuarantineItem, QuarantineStore};
use crate::scanner::progress::ScanProgress;
use crate::scanner::walk::{estimate_location, SizeEstimate};
use crate::scanner::{self, ScanHandle, ScanReport};
use crossbeam_channel::Sender;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Engine {
    config: EngineConfig,
    catalog: LocationCatalog,
    threats: ThreatIndex,
    store: Arc<QuarantineStore>,
}

impl Engine {
    pub fn new(config: EngineConfig, catalog: LocationCatalog, store: QuarantineStore) -> Self {
        Self {
            config,
            catalog,
            threats: ThreatIndex::default(),
            store: Arc::new(store),
        }
    }

    /// Detect the platform catalog and open the configured quarantine store.
    pub fn open(config: EngineConfig) -> Result<Self, QuarantineError> {
        let store = QuarantineStore::open(&config.quarantine_dir)?;
        let recovery = store.recovery_report();
        if !recovery.is_clean() {
            warn!(
                repaired = recovery.repaired.len(),
                orphans = recovery.orphans.len(),
                "Quarantine store needed recovery"
            );
        }
        let catalog = LocationCatalog::detect();
        info!("Engine ready with {} locations", catalog.len());
        Ok(Self::new(config, catalog, store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LocationCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &QuarantineStore {
        &self.store
    }

    /// Replace the external detector's findings used by the next scan.
    pub fn set_threats(&mut self, detections: Vec<ThreatDetection>) {
        self.threats = ThreatIndex::new(detections);
    }

    /// Full catalog scan. Blocks; progress goes to `progress` if given.
    pub fn scan_system(
        &self,
        progress: Option<&Sender<ScanProgress>>,
        cancel: &AtomicBool,
    ) -> ScanReport {
        scanner::scan_system(&self.catalog, &self.config, &self.threats, progress, cancel)
    }

    /// Full catalog scan on a background thread.
    pub fn start_scan(&self) -> ScanHandle {
        scanner::start_scan(
            self.catalog.clone(),
            self.config.clone(),
            self.threats.clone(),
        )
    }

    /// Scan a directory the user picked; results are never-auto.
    pub fn scan_user_path(&self, path: &Path, cancel: &AtomicBool) -> ScanReport {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let path = path.as_path();
        if let Some(owner) = self.catalog.owner_of(path) {
            info!(
                "{} lies inside catalog location {}; results stay never-auto",
                path.display(),
                owner.name
            );
        }
        scanner::scan_user_path(path, &self.config, &self.threats, cancel)
    }

    /// Pre-flight access report for every catalog location.
    pub fn probe(&self) -> Vec<ProbeReport> {
        probe_catalog(self.catalog.locations())
    }

    /// Sampled size of each catalog location. Diagnostic only.
    pub fn estimate(&self) -> Vec<(String, SizeEstimate)> {
        self.catalog
            .locations()
            .iter()
            .map(|loc| {
                (
                    loc.name.to_string(),
                    estimate_location(loc, self.config.max_depth, self.config.estimate_sample_limit),
                )
            })
            .collect()
    }

    /// Remove exactly `approved`, through the quarantine.
    pub fn clean_files(
        &self,
        approved: &[ScanResult],
        policy: &CleanPolicy,
        progress: Option<&Sender<CleanProgress>>,
        cancel: &AtomicBool,
    ) -> Result<CleanResult, CleanError> {
        cleaner::clean_files(
            &self.store,
            approved,
            policy,
            self.config.clean_workers,
            progress,
            cancel,
        )
    }

    pub fn start_clean(&self, approved: Vec<ScanResult>, policy: CleanPolicy) -> CleanHandle {
        cleaner::start_clean(
            Arc::clone(&self.store),
            approved,
            policy,
            self.config.clean_workers,
        )
    }

    pub fn get_quarantine_items(&self) -> ListReport {
        self.store.list()
    }

    /// Restore one item. `false` (with the reason logged) if refused.
    pub fn restore_quarantine_item(&self, id: &QuarantineId) -> bool {
        match self.try_restore(id) {
            Ok(_) => true,
            Err(err) => {
                warn!(quarantine_id = %id, "Restore refused: {err}");
                false
            }
        }
    }

    /// Restore with the refusal reason, for callers that can show it.
    pub fn try_restore(&self, id: &QuarantineId) -> Result<QuarantineItem, RestoreError> {
        self.store.restore(id)
    }

    /// Permanently erase items older than `older_than_days`. Irreversible.
    pub fn clear_quarantine(&self, older_than_days: u64) -> Result<usize, QuarantineError> {
        self.store.purge(older_than_days)
    }

    /// [`Engine::clear_quarantine`] with the configured retention window.
    pub fn purge_expired(&self) -> Result<usize, QuarantineError> {
        self.store.purge(self.config.retention_days)
    }
}
