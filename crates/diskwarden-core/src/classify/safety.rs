/// Safety verdict policy.
///
/// Three tiers, combined by taking the most restrictive:
/// - the location's configured default (auto-safe only when explicitly marked),
/// - never-auto for any location outside the catalog,
/// - a threat detection: quarantine recommendations need confirmation,
///   anything else is never-auto.
use crate::model::{Location, LocationOrigin, RecommendedAction, SafetyVerdict, ThreatDetection};

pub fn verdict_for(location: &Location, threat: Option<&ThreatDetection>) -> SafetyVerdict {
    let mut verdict = location.safety;

    if location.origin != LocationOrigin::Catalog {
        verdict = verdict.max(SafetyVerdict::NeverAuto);
    }

    if let Some(threat) = threat {
        let floor = match threat.recommended_action {
            RecommendedAction::Quarantine => SafetyVerdict::NeedsConfirmation,
            _ => SafetyVerdict::NeverAuto,
        };
        verdict = verdict.max(floor);
    }

    verdict
}
