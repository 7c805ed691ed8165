//! Capture session state machine
//!
//! Screen-level flow as an explicit tagged union with a transition
//! function, instead of scattered boolean flags. The async controller in
//! `services::session` drives this machine; the machine itself is pure.

use crate::domain::types::{CapturedPhoto, LocationResult, PipelineError};
use uuid::Uuid;

/// Generate a new UUIDv7 analysis id (time-sortable)
pub fn new_analysis_id() -> String {
    Uuid::now_v7().to_string()
}

/// State of the single active capture session.
///
/// `Idle` is initial. `Result` and `Error` are stable until the user acts;
/// no state is auto-exited by a timer (the recognition timeout surfaces as
/// a normal `AnalysisDone` failure).
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    Capturing,
    Previewing(CapturedPhoto),
    Analyzing(CapturedPhoto),
    Result(LocationResult),
    Error(String),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::Previewing(_) => "previewing",
            SessionState::Analyzing(_) => "analyzing",
            SessionState::Result(_) => "result",
            SessionState::Error(_) => "error",
        }
    }
}

/// Inputs to the state machine: user actions and completion events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Camera shot or gallery upload was triggered
    CaptureRequested,
    /// Capture provider delivered an image
    PhotoReady(CapturedPhoto),
    /// Capture provider failed (permission denied, IO error)
    CaptureFailed(String),
    /// User confirmed the previewed photo for analysis
    ConfirmAnalyze,
    /// User discarded the photo / dismissed the result or error
    Retake,
    /// Analysis task settled (stale completions are filtered out by the
    /// controller before they reach the machine)
    AnalysisDone(Result<LocationResult, PipelineError>),
}

impl SessionEvent {
    pub fn label(&self) -> &'static str {
        match self {
            SessionEvent::CaptureRequested => "capture_requested",
            SessionEvent::PhotoReady(_) => "photo_ready",
            SessionEvent::CaptureFailed(_) => "capture_failed",
            SessionEvent::ConfirmAnalyze => "confirm_analyze",
            SessionEvent::Retake => "retake",
            SessionEvent::AnalysisDone(_) => "analysis_done",
        }
    }
}

impl SessionState {
    /// Apply one event. Illegal (state, event) pairs leave the state
    /// unchanged; the caller decides whether to log the ignore. The
    /// machine can never get stuck: `Retake` is accepted from every
    /// non-idle state.
    pub fn apply(self, event: SessionEvent) -> SessionState {
        match (self, event) {
            (SessionState::Idle, SessionEvent::CaptureRequested) => SessionState::Capturing,

            (SessionState::Capturing, SessionEvent::PhotoReady(photo)) => {
                SessionState::Previewing(photo)
            }
            (SessionState::Capturing, SessionEvent::CaptureFailed(reason)) => {
                SessionState::Error(reason)
            }

            (SessionState::Previewing(photo), SessionEvent::ConfirmAnalyze) => {
                SessionState::Analyzing(photo)
            }

            (SessionState::Analyzing(_), SessionEvent::AnalysisDone(Ok(result))) => {
                SessionState::Result(result)
            }
            (SessionState::Analyzing(_), SessionEvent::AnalysisDone(Err(e))) => {
                SessionState::Error(e.to_string())
            }

            // Retake discards the photo or dismisses the outcome. Legal from
            // Analyzing too: the pending response becomes stale and is
            // dropped by the controller's generation check.
            (SessionState::Previewing(_), SessionEvent::Retake)
            | (SessionState::Analyzing(_), SessionEvent::Retake)
            | (SessionState::Result(_), SessionEvent::Retake)
            | (SessionState::Error(_), SessionEvent::Retake)
            | (SessionState::Capturing, SessionEvent::Retake) => SessionState::Idle,

            (state, _) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::BuildingId;
    use crate::domain::types::{ConfidenceTier, Coordinates};
    use bytes::Bytes;

    fn photo() -> CapturedPhoto {
        CapturedPhoto::new(Bytes::from_static(b"\xff\xd8\xff"), "image/jpeg")
    }

    fn result() -> LocationResult {
        LocationResult {
            building: BuildingId::BlockA,
            distance_m: 42.0,
            display_position: Coordinates::new(31.4826, 74.3035),
            confidence: 0.9,
            tier: ConfidenceTier::High,
        }
    }

    #[test]
    fn test_happy_path() {
        let s = SessionState::Idle
            .apply(SessionEvent::CaptureRequested)
            .apply(SessionEvent::PhotoReady(photo()))
            .apply(SessionEvent::ConfirmAnalyze)
            .apply(SessionEvent::AnalysisDone(Ok(result())));
        assert!(matches!(s, SessionState::Result(_)));
    }

    #[test]
    fn test_analysis_failure_goes_to_error() {
        let s = SessionState::Analyzing(photo())
            .apply(SessionEvent::AnalysisDone(Err(PipelineError::DistanceUnavailable)));
        match s {
            SessionState::Error(msg) => assert!(msg.contains("distance")),
            other => panic!("expected error state, got {}", other.label()),
        }
    }

    #[test]
    fn test_retake_returns_to_idle_from_every_state() {
        let states = [
            SessionState::Capturing,
            SessionState::Previewing(photo()),
            SessionState::Analyzing(photo()),
            SessionState::Result(result()),
            SessionState::Error("boom".to_string()),
        ];
        for state in states {
            let after = state.apply(SessionEvent::Retake);
            assert!(matches!(after, SessionState::Idle));
        }
    }

    #[test]
    fn test_capture_failure_goes_to_error() {
        let s = SessionState::Capturing
            .apply(SessionEvent::CaptureFailed("permission denied".to_string()));
        assert!(matches!(s, SessionState::Error(_)));
    }

    #[test]
    fn test_illegal_events_leave_state_unchanged() {
        let s = SessionState::Idle.apply(SessionEvent::ConfirmAnalyze);
        assert!(matches!(s, SessionState::Idle));

        let s = SessionState::Idle.apply(SessionEvent::AnalysisDone(Ok(result())));
        assert!(matches!(s, SessionState::Idle));

        let s = SessionState::Previewing(photo()).apply(SessionEvent::CaptureRequested);
        assert!(matches!(s, SessionState::Previewing(_)));
    }

    #[test]
    fn test_retake_in_idle_is_a_noop() {
        let s = SessionState::Idle.apply(SessionEvent::Retake);
        assert!(matches!(s, SessionState::Idle));
    }

    #[test]
    fn test_analysis_ids_are_unique_uuids() {
        let a = new_analysis_id();
        let b = new_analysis_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
