//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `recognition` - HTTP client for the remote recognition service
//! - `capture` - Capture provider contract (camera/gallery collaborator)
//! - `location` - Device-location provider contract
//! - `egress` - Settled-analysis output to file (JSONL format)

pub mod capture;
pub mod egress;
pub mod location;
pub mod recognition;

// Re-export commonly used types
pub use capture::{CaptureProvider, FileCaptureProvider};
pub use egress::{AnalysisRecord, ResultLog};
pub use location::{
    provider_from_config, FixedLocationProvider, LocationProvider, UnavailableLocationProvider,
};
pub use recognition::{RecognitionClient, Recognizer};
