/// Reports produced by the cleaning orchestrator.
use super::location::Category;
use crate::quarantine::QuarantineId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Summary of one clean invocation. A report only; never mutated after return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanResult {
    pub files_removed: u64,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration: Duration,
    /// Quarantine ids created by this run, in completion order.
    pub quarantined: Vec<QuarantineId>,
    /// Approved results that were not acted on (e.g. never-auto without
    /// explicit selection).
    pub skipped: u64,
    pub cancelled: bool,
}

/// Emitted after each approved result has been processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanProgress {
    pub current: usize,
    pub total: usize,
    pub current_category: Category,
    pub files_removed: u64,
    pub space_freed: u64,
}
