/// User-facing, aggregated units of reclaimable storage.
///
/// A `ScanResult` is a value: it carries the list of files it would remove
/// but holds no handles into the filesystem, and nothing mutates it after
/// the classifier returns it.
use super::location::{Category, SafetyVerdict};
use super::threat::ThreatDetection;
use crate::hasher::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;
use uuid::Uuid;

/// Generated identifier of a scan result. Unique per scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(pub Uuid);

impl ResultId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ResultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: ResultId,
    pub name: String,
    pub category: Category,
    /// Exact sum of the sizes of `paths`.
    pub total_size: u64,
    /// Exact number of entries in `paths`.
    pub file_count: u64,
    pub representative_path: PathBuf,
    pub description: String,
    pub verdict: SafetyVerdict,
    pub scanned_at: DateTime<Utc>,
    /// Root of the location that produced this result.
    pub location_root: PathBuf,
    /// Files this result would remove. For duplicates the keeper is excluded.
    pub paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_group: Option<DuplicateGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat: Option<ThreatDetection>,
}

/// One member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMember {
    pub path: PathBuf,
    pub size: u64,
    pub hash: ContentHash,
    pub modified: Option<SystemTime>,
}

/// Files sharing an identical content hash.
///
/// Members are ordered keeper first; the keeper is never proposed for removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub group_id: ResultId,
    pub members: Vec<DuplicateMember>,
    /// Sum of all member sizes, keeper included.
    pub total_size: u64,
}

impl DuplicateGroup {
    /// Number of redundant copies (`members - 1`).
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// The member that is kept.
    pub fn keeper(&self) -> Option<&DuplicateMember> {
        self.members.first()
    }

    /// Members proposed for removal.
    pub fn removable(&self) -> &[DuplicateMember] {
        self.members.get(1..).unwrap_or(&[])
    }
}
