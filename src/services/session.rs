//! Session controller - async orchestration around the session machine
//!
//! Owns the single active `SessionState`, processes commands and analysis
//! completions one at a time, and tags every dispatched analysis with the
//! current session generation. Retake bumps the generation; completions
//! carrying an old tag are discarded without touching state (pending
//! network work is fire-and-forget, never force-cancelled).

use crate::domain::registry::BuildingRegistry;
use crate::domain::session::{new_analysis_id, SessionEvent, SessionState};
use crate::domain::types::{DeviceFix, LocationResult, PipelineError};
use crate::infra::metrics::Metrics;
use crate::io::capture::CaptureProvider;
use crate::io::egress::{AnalysisRecord, ResultLog};
use crate::io::location::LocationProvider;
use crate::io::recognition::Recognizer;
use crate::services::pipeline;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// User-level actions forwarded by the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Trigger the capture provider (camera shot or gallery upload)
    Capture,
    /// Confirm the previewed photo for analysis
    Analyze,
    /// Discard the photo / dismiss the result or error
    Retake,
}

/// Settled analysis task, delivered back to the controller loop
struct AnalysisCompletion {
    generation: u64,
    analysis_id: String,
    result: Result<LocationResult, PipelineError>,
    /// True when the resolution fell back to the server distance estimate
    server_distance_used: bool,
    elapsed_ms: u64,
}

/// Drives one capture session. Renders nothing itself: every state change
/// is published on a watch channel for the rendering collaborator.
pub struct SessionController {
    state: SessionState,
    /// Bumped on every retake; in-flight analyses carry the value they
    /// were dispatched with
    generation: u64,
    registry: Arc<BuildingRegistry>,
    recognizer: Arc<dyn Recognizer>,
    location: Arc<dyn LocationProvider>,
    capture: Arc<dyn CaptureProvider>,
    metrics: Arc<Metrics>,
    egress: Option<ResultLog>,
    state_tx: watch::Sender<SessionState>,
    done_tx: mpsc::Sender<AnalysisCompletion>,
    done_rx: Option<mpsc::Receiver<AnalysisCompletion>>,
}

impl SessionController {
    pub fn new(
        registry: Arc<BuildingRegistry>,
        recognizer: Arc<dyn Recognizer>,
        location: Arc<dyn LocationProvider>,
        capture: Arc<dyn CaptureProvider>,
        metrics: Arc<Metrics>,
        egress: Option<ResultLog>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (done_tx, done_rx) = mpsc::channel(8);

        let controller = Self {
            state: SessionState::Idle,
            generation: 0,
            registry,
            recognizer,
            location,
            capture,
            metrics,
            egress,
            state_tx,
            done_tx,
            done_rx: Some(done_rx),
        };
        (controller, state_rx)
    }

    /// Run the controller until the command channel closes
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        let Some(mut done_rx) = self.done_rx.take() else {
            warn!("session_controller_already_ran");
            return;
        };

        info!("session_controller_started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break, // UI collaborator went away
                    }
                }
                done = done_rx.recv() => {
                    // The controller keeps a sender clone, so the channel
                    // never closes while we run.
                    if let Some(done) = done {
                        self.handle_completion(done);
                    }
                }
            }
        }

        info!("session_controller_stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Capture => self.handle_capture().await,
            SessionCommand::Analyze => self.handle_analyze(),
            SessionCommand::Retake => {
                // Anything still in flight is now stale.
                self.generation += 1;
                self.apply(SessionEvent::Retake);
            }
        }
    }

    async fn handle_capture(&mut self) {
        self.apply(SessionEvent::CaptureRequested);
        if !matches!(self.state, SessionState::Capturing) {
            return; // event was ignored, nothing to acquire
        }

        match self.capture.acquire().await {
            Ok(photo) => {
                info!(bytes = photo.len(), mime = %photo.mime, "photo_captured");
                self.apply(SessionEvent::PhotoReady(photo));
            }
            Err(e) => {
                warn!(error = %e, "capture_failed");
                self.apply(SessionEvent::CaptureFailed(e.to_string()));
            }
        }
    }

    fn handle_analyze(&mut self) {
        let photo = match &self.state {
            SessionState::Previewing(photo) => photo.clone(),
            _ => {
                warn!(state = %self.state.label(), "analyze_ignored_no_preview");
                return;
            }
        };
        self.apply(SessionEvent::ConfirmAnalyze);

        let analysis_id = new_analysis_id();
        let generation = self.generation;
        self.metrics.record_analysis_started();
        info!(
            analysis_id = %analysis_id,
            generation = %generation,
            bytes = photo.len(),
            "analysis_dispatched"
        );

        let recognizer = self.recognizer.clone();
        let location = self.location.clone();
        let registry = self.registry.clone();
        let done_tx = self.done_tx.clone();

        tokio::spawn(async move {
            let start = Instant::now();

            // Recognition and the device-location read are independent;
            // issue both at once and wait for both to settle.
            let (outcome, fix) =
                tokio::join!(recognizer.recognize(&photo), location.current_fix());

            let fix_unavailable = matches!(fix, DeviceFix::Unavailable);
            let result = pipeline::resolve(&registry, outcome, fix);
            let completion = AnalysisCompletion {
                generation,
                analysis_id,
                server_distance_used: fix_unavailable && result.is_ok(),
                result,
                elapsed_ms: start.elapsed().as_millis() as u64,
            };

            // Controller may be gone on shutdown; the completion is moot then.
            let _ = done_tx.send(completion).await;
        });
    }

    fn handle_completion(&mut self, done: AnalysisCompletion) {
        if done.generation != self.generation {
            info!(
                analysis_id = %done.analysis_id,
                generation = %done.generation,
                current_generation = %self.generation,
                "stale_analysis_discarded"
            );
            self.metrics.record_stale_discarded();
            return;
        }

        match &done.result {
            Ok(result) => {
                self.metrics.record_resolved(done.elapsed_ms);
                if done.server_distance_used {
                    self.metrics.record_server_distance_used();
                }
                info!(
                    analysis_id = %done.analysis_id,
                    building = %result.building,
                    distance_m = format!("{:.1}", result.distance_m),
                    tier = %result.tier.as_str(),
                    confidence = format!("{:.2}", result.confidence),
                    elapsed_ms = %done.elapsed_ms,
                    "analysis_resolved"
                );
                if let Some(log) = &self.egress {
                    log.write_record(&AnalysisRecord::resolved(&done.analysis_id, result));
                }
            }
            Err(e) => {
                self.metrics.record_latency(done.elapsed_ms);
                match e {
                    PipelineError::RecognitionFailed(reason) => {
                        self.metrics.record_recognition_failure(reason)
                    }
                    PipelineError::UnknownBuilding(_) => self.metrics.record_unknown_building(),
                    PipelineError::DistanceUnavailable => {
                        self.metrics.record_distance_unavailable()
                    }
                    PipelineError::Geo(_) => self.metrics.record_geo_failure(),
                }
                warn!(
                    analysis_id = %done.analysis_id,
                    error = %e,
                    elapsed_ms = %done.elapsed_ms,
                    "analysis_failed"
                );
                if let Some(log) = &self.egress {
                    log.write_record(&AnalysisRecord::failed(&done.analysis_id, e));
                }
            }
        }

        self.apply(SessionEvent::AnalysisDone(done.result));
    }

    /// Feed one event through the machine and publish the new state.
    /// Legal transitions always change the state label, so an unchanged
    /// label means the event was ignored.
    fn apply(&mut self, event: SessionEvent) {
        let event_label = event.label();
        let before = self.state.label();

        let state = std::mem::replace(&mut self.state, SessionState::Idle);
        self.state = state.apply(event);

        let after = self.state.label();
        if before == after {
            warn!(event = %event_label, state = %before, "session_event_ignored");
        } else {
            info!(event = %event_label, from = %before, to = %after, "session_transition");
        }

        let _ = self.state_tx.send(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::BuildingId;
    use crate::domain::types::{CaptureError, CapturedPhoto, RecognitionOutcome};
    use crate::io::location::UnavailableLocationProvider;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    struct StubRecognizer {
        outcome: RecognitionOutcome,
        /// When set, recognition blocks until the test fires the notify
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl Recognizer for StubRecognizer {
        async fn recognize(&self, _photo: &CapturedPhoto) -> RecognitionOutcome {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    struct StaticCaptureProvider;

    #[async_trait]
    impl CaptureProvider for StaticCaptureProvider {
        async fn acquire(&self) -> Result<CapturedPhoto, CaptureError> {
            Ok(CapturedPhoto::new(Bytes::from_static(b"\xff\xd8\xff"), "image/jpeg"))
        }
    }

    struct FailingCaptureProvider;

    #[async_trait]
    impl CaptureProvider for FailingCaptureProvider {
        async fn acquire(&self) -> Result<CapturedPhoto, CaptureError> {
            Err(CaptureError::Unavailable("camera permission denied".to_string()))
        }
    }

    fn recognized(label: &str) -> RecognitionOutcome {
        RecognitionOutcome::Recognized {
            raw_label: label.to_string(),
            confidence: 0.9,
            server_distance_m: Some(12.0),
            server_coordinates: None,
        }
    }

    fn spawn_controller(
        recognizer: StubRecognizer,
        capture: Arc<dyn CaptureProvider>,
        metrics: Arc<Metrics>,
    ) -> (mpsc::Sender<SessionCommand>, watch::Receiver<SessionState>) {
        let (controller, state_rx) = SessionController::new(
            Arc::new(BuildingRegistry::new()),
            Arc::new(recognizer),
            Arc::new(UnavailableLocationProvider),
            capture,
            metrics,
            None,
        );
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        tokio::spawn(controller.run(cmd_rx));
        (cmd_tx, state_rx)
    }

    async fn wait_for_label(
        state_rx: &mut watch::Receiver<SessionState>,
        label: &str,
    ) -> SessionState {
        timeout(Duration::from_secs(2), async {
            loop {
                let current = state_rx.borrow().clone();
                if current.label() == label {
                    return current;
                }
                state_rx.changed().await.expect("controller dropped");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {label}"))
    }

    #[tokio::test]
    async fn test_capture_analyze_resolves() {
        let recognizer = StubRecognizer { outcome: recognized("Block A"), gate: None };
        let (cmd_tx, mut state_rx) =
            spawn_controller(recognizer, Arc::new(StaticCaptureProvider), Arc::new(Metrics::new()));

        cmd_tx.send(SessionCommand::Capture).await.unwrap();
        wait_for_label(&mut state_rx, "previewing").await;

        cmd_tx.send(SessionCommand::Analyze).await.unwrap();
        let state = wait_for_label(&mut state_rx, "result").await;
        match state {
            SessionState::Result(result) => {
                assert_eq!(result.building, BuildingId::BlockA);
                assert_eq!(result.distance_m, 12.0);
            }
            other => panic!("expected result, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_unknown_label_surfaces_error_then_retake_recovers() {
        let recognizer = StubRecognizer { outcome: recognized("Hogwarts"), gate: None };
        let (cmd_tx, mut state_rx) =
            spawn_controller(recognizer, Arc::new(StaticCaptureProvider), Arc::new(Metrics::new()));

        cmd_tx.send(SessionCommand::Capture).await.unwrap();
        wait_for_label(&mut state_rx, "previewing").await;
        cmd_tx.send(SessionCommand::Analyze).await.unwrap();

        let state = wait_for_label(&mut state_rx, "error").await;
        match state {
            SessionState::Error(msg) => assert!(msg.contains("Hogwarts")),
            other => panic!("expected error, got {}", other.label()),
        }

        cmd_tx.send(SessionCommand::Retake).await.unwrap();
        wait_for_label(&mut state_rx, "idle").await;
    }

    #[tokio::test]
    async fn test_capture_failure_goes_to_error() {
        let recognizer = StubRecognizer { outcome: recognized("Block A"), gate: None };
        let (cmd_tx, mut state_rx) = spawn_controller(
            recognizer,
            Arc::new(FailingCaptureProvider),
            Arc::new(Metrics::new()),
        );

        cmd_tx.send(SessionCommand::Capture).await.unwrap();
        let state = wait_for_label(&mut state_rx, "error").await;
        match state {
            SessionState::Error(msg) => assert!(msg.contains("permission denied")),
            other => panic!("expected error, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_stale_completion_after_retake_is_discarded() {
        let gate = Arc::new(Notify::new());
        let recognizer =
            StubRecognizer { outcome: recognized("Block A"), gate: Some(gate.clone()) };
        let metrics = Arc::new(Metrics::new());
        let (cmd_tx, mut state_rx) =
            spawn_controller(recognizer, Arc::new(StaticCaptureProvider), metrics.clone());

        cmd_tx.send(SessionCommand::Capture).await.unwrap();
        wait_for_label(&mut state_rx, "previewing").await;
        cmd_tx.send(SessionCommand::Analyze).await.unwrap();
        wait_for_label(&mut state_rx, "analyzing").await;

        // Retake while the recognition response is still pending.
        cmd_tx.send(SessionCommand::Retake).await.unwrap();
        wait_for_label(&mut state_rx, "idle").await;

        // Let the stalled recognition finish; its completion is stale now.
        gate.notify_one();
        timeout(Duration::from_secs(2), async {
            while metrics.stale_discarded_total() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("stale completion never discarded");

        // The stale response must not have mutated state.
        assert_eq!(state_rx.borrow().label(), "idle");
        assert_eq!(metrics.resolved_total(), 0);
    }

    #[tokio::test]
    async fn test_analyze_without_preview_is_ignored() {
        let recognizer = StubRecognizer { outcome: recognized("Block A"), gate: None };
        let metrics = Arc::new(Metrics::new());
        let (cmd_tx, mut state_rx) =
            spawn_controller(recognizer, Arc::new(StaticCaptureProvider), metrics.clone());

        cmd_tx.send(SessionCommand::Analyze).await.unwrap();
        // Give the controller a beat to process; state must remain idle and
        // no analysis may have been dispatched.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state_rx.borrow_and_update().label(), "idle");
        assert_eq!(metrics.analyses_total(), 0);
    }
}
