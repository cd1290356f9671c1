/// Platform-specific functionality: access probing and elevation checks.

pub mod permissions;

pub use permissions::{is_elevated, probe_access, probe_catalog, AccessClass, ProbeReport};
