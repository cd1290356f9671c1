/// One filesystem entry discovered during a scan, before classification.
///
/// Candidates borrow their owning [`Location`], so they cannot outlive the
/// scan pass that produced them.
use super::location::Location;
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Logical size in bytes.
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub location: &'a Location,
}

impl Candidate<'_> {
    /// File name component, for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
