//! Recognition service client
//!
//! Sends the captured image to the remote `/recognize_landmark` endpoint
//! as a multipart upload and maps the reply onto `RecognitionOutcome`.
//! Every failure mode gets a distinct reason; nothing is retried here —
//! a new attempt requires an explicit user action upstream.

use crate::domain::types::{CapturedPhoto, Coordinates, RecognitionFailure, RecognitionOutcome};
use crate::infra::config::Config;
use async_trait::async_trait;
use reqwest::{multipart, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Anything that can turn a photo into a recognition outcome. The session
/// controller only sees this trait, which keeps it testable without a
/// network.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, photo: &CapturedPhoto) -> RecognitionOutcome;
}

/// Success-shape of the service reply. `distance` is null when the backend
/// found no reference object in the frame.
#[derive(Debug, Deserialize)]
struct WireResponse {
    building: String,
    confidence: f64,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    coordinates: Option<WireCoordinates>,
}

#[derive(Debug, Deserialize)]
struct WireCoordinates {
    lat: f64,
    lng: f64,
}

/// Error-shape of the service reply (`{"error": "..."}` with status >= 400)
#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
}

/// HTTP client for the recognition endpoint. One reqwest client per
/// instance for connection pooling; the configured timeout bounds the
/// whole round-trip.
pub struct RecognitionClient {
    endpoint: String,
    http: reqwest::Client,
}

impl RecognitionClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.recognition_timeout_ms()))
            .http1_only()
            .build()?;

        let endpoint = format!(
            "{}/recognize_landmark",
            config.recognition_base_url().trim_end_matches('/')
        );

        Ok(Self { endpoint, http })
    }

    fn image_part(photo: &CapturedPhoto) -> multipart::Part {
        let part = multipart::Part::bytes(photo.bytes.to_vec()).file_name("photo.jpg");
        match part.mime_str(&photo.mime) {
            Ok(part) => part,
            Err(_) => {
                warn!(mime = %photo.mime, "invalid_mime_type_defaulting_to_jpeg");
                multipart::Part::bytes(photo.bytes.to_vec())
                    .file_name("photo.jpg")
                    .mime_str("image/jpeg")
                    .expect("static mime string is valid")
            }
        }
    }
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn recognize(&self, photo: &CapturedPhoto) -> RecognitionOutcome {
        let start = Instant::now();
        let form = multipart::Form::new().part("image", Self::image_part(photo));

        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    error = %e,
                    timeout = e.is_timeout(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "recognition_request_failed"
                );
                return RecognitionOutcome::Failed { reason: RecognitionFailure::Network };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "recognition_body_read_failed");
                return RecognitionOutcome::Failed { reason: RecognitionFailure::Network };
            }
        };

        let outcome = outcome_from_response(status, &body);
        debug!(
            status = %status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes_sent = photo.len(),
            "recognition_round_trip"
        );
        outcome
    }
}

/// Map an HTTP reply onto the outcome taxonomy. Split out of the request
/// path so the parsing rules are testable without a server.
fn outcome_from_response(status: StatusCode, body: &str) -> RecognitionOutcome {
    if status.as_u16() >= 400 {
        // The backend sends {"error": "..."} on rejection; log it, the
        // structured reason is the status code.
        let message = serde_json::from_str::<WireError>(body)
            .map(|e| e.error)
            .unwrap_or_default();
        warn!(status = %status.as_u16(), message = %message, "recognition_server_rejected");
        return RecognitionOutcome::Failed {
            reason: RecognitionFailure::ServerRejected { status: status.as_u16() },
        };
    }

    match serde_json::from_str::<WireResponse>(body) {
        Ok(wire) => RecognitionOutcome::Recognized {
            raw_label: wire.building,
            confidence: wire.confidence,
            server_distance_m: wire.distance,
            server_coordinates: wire
                .coordinates
                .map(|c| Coordinates::new(c.lat, c.lng)),
        },
        Err(e) => {
            warn!(error = %e, "recognition_response_malformed");
            RecognitionOutcome::Failed { reason: RecognitionFailure::InvalidResponse }
        }
    }
}
