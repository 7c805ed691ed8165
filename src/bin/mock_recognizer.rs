//! Mock recognition service
//!
//! Simulates the remote landmark-recognition backend for local testing.
//!
//! Contract:
//! - POST /recognize_landmark with a multipart body, image under field `image`
//! - 200 -> {"building": "...", "confidence": 0.92, "distance": 17.5,
//!   "coordinates": {"lat": ..., "lng": ...}}
//! - 400 -> {"error": "No image uploaded"} when the body is empty
//!
//! Failure injection via --fail-mode lets the client's error taxonomy be
//! exercised end to end (rejection, malformed JSON).
//!
//! Usage:
//!   cargo run --bin mock-recognizer -- --port 5002 --building "Block A"

use bytes::Bytes;
use campus_lens::domain::registry::BuildingRegistry;
use clap::{Parser, ValueEnum};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailMode {
    /// Answer normally
    None,
    /// Reject every request with HTTP 500
    Reject,
    /// Answer 200 with a non-JSON body
    Garbage,
}

#[derive(Parser, Debug)]
#[command(name = "mock-recognizer")]
#[command(about = "Mock landmark recognition service for local testing")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "5002")]
    port: u16,

    /// Building label to return (any string; unknown labels exercise the
    /// client's unknown-building path)
    #[arg(short, long, default_value = "Block A")]
    building: String,

    /// Confidence to return
    #[arg(long, default_value = "0.92")]
    confidence: f64,

    /// Distance estimate in meters (null in the response when absent, like
    /// the real backend when no reference object is detected)
    #[arg(long)]
    distance: Option<f64>,

    /// Failure injection mode
    #[arg(long, value_enum, default_value = "none")]
    fail_mode: FailMode,
}

struct MockConfig {
    building: String,
    confidence: f64,
    distance: Option<f64>,
    fail_mode: FailMode,
    registry: BuildingRegistry,
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn recognition_body(config: &MockConfig) -> String {
    let mut body = json!({
        "building": config.building,
        "confidence": config.confidence,
        "distance": config.distance,
    });
    // Echo registry coordinates when the configured label is a real
    // building, like the real backend does.
    if let Some(record) = config.registry.lookup(&config.building) {
        body["coordinates"] = json!({
            "lat": record.position.latitude,
            "lng": record.position.longitude,
        });
    }
    body.to_string()
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    config: Arc<MockConfig>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/recognize_landmark") => {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(error = %e, "mock_body_read_failed");
                    return Ok(json_response(
                        StatusCode::BAD_REQUEST,
                        json!({"error": "Invalid image"}).to_string(),
                    ));
                }
            };

            if body.is_empty() {
                return Ok(json_response(
                    StatusCode::BAD_REQUEST,
                    json!({"error": "No image uploaded"}).to_string(),
                ));
            }

            match config.fail_mode {
                FailMode::Reject => {
                    info!(bytes = body.len(), "mock_rejecting_request");
                    Ok(json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"error": "model unavailable"}).to_string(),
                    ))
                }
                FailMode::Garbage => {
                    info!(bytes = body.len(), "mock_returning_garbage");
                    Ok(Response::builder()
                        .status(StatusCode::OK)
                        .header("Content-Type", "text/html")
                        .body(Full::new(Bytes::from("<html>not json</html>")))
                        .expect("static response should not fail"))
                }
                FailMode::None => {
                    info!(
                        bytes = body.len(),
                        building = %config.building,
                        confidence = %config.confidence,
                        "mock_recognition_served"
                    );
                    Ok(json_response(StatusCode::OK, recognition_body(&config)))
                }
            }
        }
        _ => Ok(json_response(
            StatusCode::NOT_FOUND,
            json!({"error": "not found"}).to_string(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Arc::new(MockConfig {
        building: args.building,
        confidence: args.confidence,
        distance: args.distance,
        fail_mode: args.fail_mode,
        registry: BuildingRegistry::new(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        port = %args.port,
        building = %config.building,
        fail_mode = ?config.fail_mode,
        "mock_recognizer_started"
    );

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let io = TokioIo::new(stream);
                let config = config.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let config = config.clone();
                        async move { handle_request(req, config).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!(error = %e, "mock_http_error");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "mock_accept_error");
            }
        }
    }
}
