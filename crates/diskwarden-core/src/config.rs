/// Engine configuration: traversal limits, hashing thresholds, worker
/// pool sizes and the quarantine location.
///
/// Every field has a default so a partial JSON file is valid.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// Name of the per-user directory under the platform config/data dirs.
pub const APP_DIR_NAME: &str = "diskwarden";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum traversal depth below each location root.
    pub max_depth: usize,
    /// Maximum entries (files and directories) visited per location.
    pub max_entries_per_location: usize,
    /// Files smaller than this are never hashed or grouped as duplicates.
    pub hash_min_size: u64,
    /// Read buffer size for content hashing.
    pub hash_chunk_size: usize,
    /// Files at or above this size are surfaced individually as `large`.
    pub large_file_floor: u64,
    /// Locations scanned concurrently. Also bounds hashing parallelism.
    pub scan_workers: usize,
    /// Files moved concurrently during a clean.
    pub clean_workers: usize,
    /// Holding area for quarantined files.
    pub quarantine_dir: PathBuf,
    /// Default age, in days, used by `Engine::purge_expired`.
    pub retention_days: u64,
    /// Entries summed by the diagnostic size estimate.
    pub estimate_sample_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_entries_per_location: 200_000,
            hash_min_size: MIB,
            hash_chunk_size: 64 * 1024,
            large_file_floor: 500 * MIB,
            scan_workers: num_cpus::get().clamp(1, 4),
            clean_workers: 2,
            quarantine_dir: default_quarantine_dir(),
            retention_days: 30,
            estimate_sample_limit: 1_000,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `<config dir>/diskwarden/config.json`, or defaults if it does not exist.
    ///
    /// A file that exists but does not parse is an error rather than a silent default.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Location of the user config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
}

fn default_quarantine_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join("quarantine")
}
