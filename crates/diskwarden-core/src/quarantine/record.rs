//! Quarantine record types and their on-disk encoding.

use crate::hasher::ContentHash;
use crate::model::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name written into `store.json` so a directory can be recognised as a store.
pub const STORE_FORMAT: &str = "diskwarden-quarantine";
/// Bumped whenever the layout below changes incompatibly.
pub const STORE_VERSION: u32 = 1;

/// Identifier of a quarantined item, derived from its content and origin.
///
/// Sixteen bytes of `blake3(checksum ‖ original path ‖ timestamp)`, hex encoded,
/// so two identical files quarantined from different paths get distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuarantineId(pub String);

impl QuarantineId {
    pub fn derive(checksum: &ContentHash, original: &Path, at: DateTime<Utc>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&checksum.0);
        hasher.update(original.to_string_lossy().as_bytes());
        hasher.update(&at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(hex[..32].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids are lowercase hex; anything else cannot name a record file.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 32 && self.0.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
    }
}

impl fmt::Display for QuarantineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuarantineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Metadata for one quarantined file.
///
/// Created only after a successful move; removed by restore or purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineItem {
    pub id: QuarantineId,
    pub original_path: PathBuf,
    /// Location of the payload inside the store.
    pub storage_path: PathBuf,
    pub size: u64,
    pub checksum: ContentHash,
    pub quarantined_at: DateTime<Utc>,
    pub category: Category,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Layout descriptor stored at the root of the quarantine directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl StoreDescriptor {
    pub fn current() -> Self {
        Self {
            format: STORE_FORMAT.to_string(),
            version: STORE_VERSION,
            created_at: Utc::now(),
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.format == STORE_FORMAT && self.version == STORE_VERSION
    }
}

/// Health of a listed item, from the integrity check run by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ItemHealth {
    Intact,
    Corrupt(CorruptionKind),
}

/// Ways a record and its payload can disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CorruptionKind {
    PayloadMissing,
    SizeMismatch { expected: u64, actual: u64 },
    ChecksumMismatch { expected: String, actual: String },
    Unreadable { reason: String },
}

impl fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadMissing => f.write_str("payload missing"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch (expected {expected}, found {actual})")
            }
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch (expected {expected}, found {actual})")
            }
            Self::Unreadable { reason } => write!(f, "payload unreadable: {reason}"),
        }
    }
}

/// One row of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListedItem {
    pub item: QuarantineItem,
    pub health: ItemHealth,
}

impl ListedItem {
    pub fn is_restorable(&self) -> bool {
        self.health == ItemHealth::Intact
    }
}

/// Result of `QuarantineStore::list`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListReport {
    /// Newest first.
    pub items: Vec<ListedItem>,
    /// Payload files with no metadata record.
    pub orphans: Vec<PathBuf>,
    pub warnings: Vec<String>,
}
