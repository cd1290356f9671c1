/// Threat detections supplied by an external detector.
///
/// The engine does not compute these. A detection only changes how a
/// matching file is classified: it is split out of its bucket and, unless
/// the detector recommends quarantine, marked never-auto.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Quarantine,
    Delete,
    Ignore,
    Report,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatDetection {
    pub path: PathBuf,
    pub threat_type: String,
    pub severity: String,
    pub description: String,
    pub recommended_action: RecommendedAction,
}
