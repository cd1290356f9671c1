/// Data model for the engine: locations, scan candidates, aggregated
/// results, and the reports returned by a clean.
pub mod candidate;
pub mod clean;
pub mod location;
pub mod scan_result;
pub mod size;
pub mod threat;

pub use candidate::Candidate;
pub use clean::{CleanProgress, CleanResult};
pub use location::{Category, Location, LocationOrigin, Platform, SafetyVerdict};
pub use scan_result::{DuplicateGroup, DuplicateMember, ResultId, ScanResult};
pub use threat::{RecommendedAction, ThreatDetection};
