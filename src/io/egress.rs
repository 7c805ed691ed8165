//! Analysis egress - appends settled analyses to a JSONL file
//!
//! One JSON object per line, short keys, for offline inspection of what
//! the pipeline decided. This is a debug artifact: the in-session
//! `LocationResult` is still single-consumer and dies on retake.

use crate::domain::types::{ConfidenceTier, LocationResult, PipelineError};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// One line of the egress file
#[derive(Debug, Serialize)]
pub struct AnalysisRecord {
    /// Analysis id (UUIDv7)
    pub aid: String,
    /// Settlement timestamp (ISO 8601 UTC)
    pub ts: String,
    /// "resolved" or the failure kind
    pub out: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bld: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<ConfidenceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl AnalysisRecord {
    pub fn resolved(aid: &str, result: &LocationResult) -> Self {
        Self {
            aid: aid.to_string(),
            ts: Utc::now().to_rfc3339(),
            out: "resolved",
            bld: Some(result.building.as_label().to_string()),
            dist_m: Some(result.distance_m),
            lat: Some(result.display_position.latitude),
            lon: Some(result.display_position.longitude),
            conf: Some(result.confidence),
            tier: Some(result.tier),
            err: None,
        }
    }

    pub fn failed(aid: &str, error: &PipelineError) -> Self {
        Self {
            aid: aid.to_string(),
            ts: Utc::now().to_rfc3339(),
            out: error.as_str(),
            bld: None,
            dist_m: None,
            lat: None,
            lon: None,
            conf: None,
            tier: None,
            err: Some(error.to_string()),
        }
    }
}

/// Egress writer for settled analyses
pub struct ResultLog {
    file_path: String,
}

impl ResultLog {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "egress_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write a record to the egress file.
    /// Returns true if successful, false otherwise.
    pub fn write_record(&self, record: &AnalysisRecord) -> bool {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                error!(aid = %record.aid, error = %e, "analysis_serialize_failed");
                return false;
            }
        };

        match self.append_line(&json) {
            Ok(()) => {
                debug!(aid = %record.aid, out = %record.out, "analysis_egressed");
                true
            }
            Err(e) => {
                error!(aid = %record.aid, error = %e, "analysis_egress_failed");
                false
            }
        }
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;

        Ok(())
    }
}
