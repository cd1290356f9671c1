/// DiskWarden Core: scan, classify, and reversibly clean reclaimable disk space.
///
/// This crate contains all engine logic with zero UI dependencies. Frontends
/// (the bundled CLI, or any GUI/IPC layer) drive it through [`engine::Engine`].
///
/// # Modules
///
/// - [`catalog`]: per-platform location providers and the merged catalog.
/// - [`platform`]: access probing and elevation checks.
/// - [`scanner`]: bounded walks over catalog locations, with progress.
/// - [`hasher`]: streaming content fingerprints for duplicate detection.
/// - [`classify`]: buckets, duplicate groups, large files, safety verdicts.
/// - [`quarantine`]: checksum-addressed holding area with restore and purge.
/// - [`cleaner`]: turns approved results into quarantine moves.
/// - [`engine`]: the facade the presentation layer calls.
pub mod catalog;
pub mod classify;
pub mod cleaner;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod model;
pub mod platform;
pub mod quarantine;
pub mod scanner;

pub use cleaner::CleanPolicy;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{CleanError, ConfigError, QuarantineError, RestoreError};
