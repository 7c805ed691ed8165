//! Localization pipeline
//!
//! Turns a recognition outcome plus an optional device fix into a
//! `LocationResult`: validate the label against the registry, resolve a
//! distance (device fix wins over the server estimate), synthesize the
//! map marker position, and bucket the confidence.

use crate::domain::geo::{destination_point, haversine_distance};
use crate::domain::registry::BuildingRegistry;
use crate::domain::types::{
    ConfidenceTier, DeviceFix, LocationResult, PipelineError, RecognitionOutcome,
};
use tracing::{debug, warn};

/// Minimum marker separation from the building. Keeps the synthetic
/// position visibly apart from the building marker; the distance shown
/// in text stays unclamped.
pub const MIN_DISPLAY_DISTANCE_M: f64 = 5.0;

/// The marker is always placed due north of the building. The true
/// bearing from the user is not known; only the distance is narrated.
const DISPLAY_BEARING_DEG: f64 = 0.0;

/// Resolve one analysis attempt. Terminal on any failure; retries are an
/// explicit user action upstream.
pub fn resolve(
    registry: &BuildingRegistry,
    outcome: RecognitionOutcome,
    device_fix: DeviceFix,
) -> Result<LocationResult, PipelineError> {
    let (raw_label, confidence, server_distance_m) = match outcome {
        RecognitionOutcome::Failed { reason } => {
            return Err(PipelineError::RecognitionFailed(reason))
        }
        RecognitionOutcome::Recognized { raw_label, confidence, server_distance_m, .. } => {
            (raw_label, confidence, server_distance_m)
        }
    };

    // An unknown label must never fall back to a default building.
    let record = match registry.lookup(&raw_label) {
        Some(record) => record,
        None => return Err(PipelineError::UnknownBuilding(raw_label)),
    };

    // Device fix wins: it reflects the user's real position rather than
    // the server's single-image estimate.
    let distance_m = match device_fix {
        DeviceFix::Fix(position) => {
            let d = haversine_distance(position, record.position)?;
            debug!(building = %record.id, distance_m = %d, source = "device_fix", "distance_resolved");
            d
        }
        DeviceFix::Unavailable => match server_distance_m {
            Some(d) if d.is_finite() && d >= 0.0 => {
                debug!(building = %record.id, distance_m = %d, source = "server", "distance_resolved");
                d
            }
            Some(d) => {
                warn!(building = %record.id, distance_m = %d, "server_distance_invalid");
                return Err(PipelineError::DistanceUnavailable);
            }
            None => return Err(PipelineError::DistanceUnavailable),
        },
    };

    let display_distance = distance_m.max(MIN_DISPLAY_DISTANCE_M);
    let display_position =
        destination_point(record.position, display_distance, DISPLAY_BEARING_DEG)?;

    let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
    let tier = ConfidenceTier::from_confidence(confidence);

    Ok(LocationResult {
        building: record.id,
        distance_m,
        display_position,
        confidence,
        tier,
    })
}
