/// Per-run removal policy supplied by whoever collected the user's approval.
use crate::model::{ResultId, SafetyVerdict, ScanResult};
use std::collections::HashSet;

/// What the user explicitly asked for beyond approving a result.
///
/// The default policy quarantines every approved `auto-safe` or
/// `needs-confirmation` result and skips `never-auto` ones.
#[derive(Debug, Clone, Default)]
pub struct CleanPolicy {
    /// Results the user picked one by one. Required for `never-auto`.
    explicitly_selected: HashSet<ResultId>,
    /// Results confirmed through the separate "permanently delete" path.
    permanent_delete: HashSet<ResultId>,
}

/// How one approved result will be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Quarantine,
    Delete,
    Skip,
}

impl CleanPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_explicitly(mut self, id: ResultId) -> Self {
        self.explicitly_selected.insert(id);
        self
    }

    /// Permanent deletion also counts as an explicit selection.
    pub fn confirm_permanent_delete(mut self, id: ResultId) -> Self {
        self.explicitly_selected.insert(id);
        self.permanent_delete.insert(id);
        self
    }

    pub fn is_selected(&self, id: &ResultId) -> bool {
        self.explicitly_selected.contains(id)
    }

    pub fn is_permanent(&self, id: &ResultId) -> bool {
        self.permanent_delete.contains(id)
    }

    pub fn disposition(&self, result: &ScanResult) -> Disposition {
        if result.verdict == SafetyVerdict::NeverAuto && !self.is_selected(&result.id) {
            Disposition::Skip
        } else if self.is_permanent(&result.id) {
            Disposition::Delete
        } else {
            Disposition::Quarantine
        }
    }
}
