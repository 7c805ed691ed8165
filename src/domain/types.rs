//! Shared types for the landmark localization pipeline

use crate::domain::registry::BuildingId;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both components are finite numbers (NaN and infinities rejected)
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Why a recognition request produced no usable label
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionFailure {
    #[error("recognition service unreachable or timed out")]
    Network,
    #[error("recognition service rejected the request (HTTP {status})")]
    ServerRejected { status: u16 },
    #[error("recognition service returned a malformed response")]
    InvalidResponse,
}

impl RecognitionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionFailure::Network => "network",
            RecognitionFailure::ServerRejected { .. } => "server_rejected",
            RecognitionFailure::InvalidResponse => "invalid_response",
        }
    }
}

/// Result of one recognition round-trip.
///
/// Produced once per analysis request and consumed exactly once by the
/// localization pipeline; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Recognized {
        /// Label exactly as the service returned it; may not be a known building
        raw_label: String,
        /// Model confidence in [0,1] (clamped downstream if out of range)
        confidence: f64,
        /// Server-side distance estimate in meters, present only when the
        /// backend detected a reference object in the frame
        server_distance_m: Option<f64>,
        /// Coordinates echoed by the server; informational only, the registry
        /// is authoritative for building positions
        server_coordinates: Option<Coordinates>,
    },
    Failed {
        reason: RecognitionFailure,
    },
}

/// Coarse confidence bucket shown next to the raw percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Map a raw confidence to a tier. Values outside [0,1] are clamped
    /// before comparison.
    pub fn from_confidence(confidence: f64) -> Self {
        let c = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        if c > 0.8 {
            ConfidenceTier::High
        } else if c > 0.5 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

/// Final output of the localization pipeline, handed to the rendering
/// collaborator and discarded on retake.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResult {
    pub building: BuildingId,
    /// True (unclamped) distance in meters
    pub distance_m: f64,
    /// Synthetic marker position: due north of the building at the
    /// floor-clamped display distance
    pub display_position: Coordinates,
    /// Raw confidence, clamped to [0,1]
    pub confidence: f64,
    pub tier: ConfidenceTier,
}

/// Terminal failure of one analysis attempt. Nothing here is retried
/// automatically; the user re-triggers explicitly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("could not recognize the building: {0}")]
    RecognitionFailed(#[from] RecognitionFailure),
    #[error("service returned an unknown building label \"{0}\"")]
    UnknownBuilding(String),
    #[error("no distance source available (no device fix, no server estimate)")]
    DistanceUnavailable,
    #[error("geometry contract violation: {0}")]
    Geo(#[from] crate::domain::geo::GeoError),
}

impl PipelineError {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineError::RecognitionFailed(_) => "recognition_failed",
            PipelineError::UnknownBuilding(_) => "unknown_building",
            PipelineError::DistanceUnavailable => "distance_unavailable",
            PipelineError::Geo(_) => "geo",
        }
    }
}

/// Capture provider failure (permission denied, camera/file IO, cancelled)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture unavailable: {0}")]
    Unavailable(String),
}

/// An image obtained from the capture provider (camera shot or gallery pick)
#[derive(Clone, PartialEq)]
pub struct CapturedPhoto {
    pub bytes: Bytes,
    pub mime: String,
}

impl CapturedPhoto {
    pub fn new(bytes: Bytes, mime: impl Into<String>) -> Self {
        Self { bytes, mime: mime.into() }
    }

    /// Decode a base64 payload (gallery uploads arrive base64-encoded)
    pub fn from_base64(encoded: &str, mime: impl Into<String>) -> Result<Self, CaptureError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CaptureError::Unavailable(format!("invalid base64 payload: {e}")))?;
        Ok(Self::new(Bytes::from(bytes), mime))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Bytes would dump the whole payload; log size and type instead.
impl std::fmt::Debug for CapturedPhoto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedPhoto")
            .field("bytes", &self.bytes.len())
            .field("mime", &self.mime)
            .finish()
    }
}

/// Device geolocation reading. Permission denied is a flavor of
/// `Unavailable`, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceFix {
    Fix(Coordinates),
    Unavailable,
}

/// Human-readable distance: centimeters below one meter, meters otherwise
pub fn format_distance(meters: f64) -> String {
    if meters < 1.0 {
        format!("{:.1} cm", meters * 100.0)
    } else {
        format!("{:.1} m", meters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(ConfidenceTier::from_confidence(0.95), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(0.81), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(0.8), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_confidence(0.6), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_confidence(0.5), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_confidence(0.2), ConfidenceTier::Low);
    }

    #[test]
    fn test_tier_clamps_out_of_range() {
        assert_eq!(ConfidenceTier::from_confidence(1.7), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_confidence(-0.3), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_confidence(f64::NAN), ConfidenceTier::Low);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.42), "42.0 cm");
        assert_eq!(format_distance(1.0), "1.0 m");
        assert_eq!(format_distance(129.83), "129.8 m");
    }

    #[test]
    fn test_photo_from_base64() {
        let photo = CapturedPhoto::from_base64("aGVsbG8=", "image/jpeg").unwrap();
        assert_eq!(photo.bytes.as_ref(), b"hello");
        assert_eq!(photo.mime, "image/jpeg");
    }

    #[test]
    fn test_photo_from_base64_rejects_garbage() {
        assert!(CapturedPhoto::from_base64("not base64!!!", "image/jpeg").is_err());
    }

    #[test]
    fn test_coordinates_finite() {
        assert!(Coordinates::new(31.48, 74.30).is_finite());
        assert!(!Coordinates::new(f64::NAN, 74.30).is_finite());
        assert!(!Coordinates::new(31.48, f64::INFINITY).is_finite());
    }
}
