/// Permission probe: tests whether a root is readable before it is scanned.
///
/// Missing and unreadable roots are steady-state outcomes on any machine
/// (a browser that was never installed, a system cache owned by root), so
/// the probe reports them as values and never fails.
use crate::model::Location;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result of probing one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "lowercase")]
pub enum AccessClass {
    /// Readable. Carries the number of immediate entries (1 for a plain file).
    Accessible { entries: u64 },
    /// Exists but cannot be read.
    Denied { reason: String },
    Absent,
}

impl AccessClass {
    pub fn is_accessible(&self) -> bool {
        matches!(self, Self::Accessible { .. })
    }
}

/// Diagnostic row explaining why a location did or did not yield results.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub root: PathBuf,
    pub access: AccessClass,
    /// Whether the process had administrator/root privileges when probing.
    pub elevated: bool,
}

/// Classify `path` as accessible, denied or absent.
pub fn probe_access(path: &Path) -> AccessClass {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return AccessClass::Absent,
        Err(e) => {
            return AccessClass::Denied {
                reason: e.to_string(),
            }
        }
    };

    if !meta.is_dir() {
        return match std::fs::File::open(path) {
            Ok(_) => AccessClass::Accessible { entries: 1 },
            Err(e) => AccessClass::Denied {
                reason: e.to_string(),
            },
        };
    }

    match std::fs::read_dir(path) {
        Ok(entries) => AccessClass::Accessible {
            entries: entries.filter(|e| e.is_ok()).count() as u64,
        },
        Err(e) if e.kind() == ErrorKind::NotFound => AccessClass::Absent,
        Err(e) => AccessClass::Denied {
            reason: e.to_string(),
        },
    }
}

/// Probe every location root.
pub fn probe_catalog(locations: &[Location]) -> Vec<ProbeReport> {
    let elevated = is_elevated();
    locations
        .iter()
        .map(|loc| ProbeReport {
            name: loc.name.to_string(),
            root: loc.root.clone(),
            access: probe_access(&loc.root),
            elevated,
        })
        .collect()
}

/// Check whether the current process is running with elevated (admin) privileges.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{
        GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token_handle = HANDLE::default();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token_handle).is_err() {
            return false;
        }

        let mut elevation = TOKEN_ELEVATION::default();
        let mut return_length = 0u32;
        let result = GetTokenInformation(
            token_handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut return_length,
        );
        let _ = CloseHandle(token_handle);

        result.is_ok() && elevation.TokenIsElevated != 0
    }
}

/// Check whether the current process is running as root.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(windows, unix)))]
pub fn is_elevated() -> bool {
    false
}
