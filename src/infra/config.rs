//! Configuration loading from TOML files
//!
//! Every section is optional; a missing or unreadable file falls back to
//! defaults with a warning so the CLI stays usable out of the box.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// Device fix pinned to the configured coordinates
    Fixed,
    /// Device location never available (permission denied, no sensor)
    Unavailable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout for one recognition round-trip
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5002".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), timeout_ms: default_timeout_ms() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_location_mode")]
    pub mode: LocationMode,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn default_location_mode() -> LocationMode {
    LocationMode::Unavailable
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { mode: default_location_mode(), latitude: None, longitude: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    /// File path for resolved-analysis egress (JSONL format)
    #[serde(default = "default_egress_file")]
    pub file: String,
    #[serde(default = "default_egress_enabled")]
    pub enabled: bool,
}

fn default_egress_file() -> String {
    "analyses.jsonl".to_string()
}

fn default_egress_enabled() -> bool {
    true
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { file: default_egress_file(), enabled: default_egress_enabled() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    recognition: RecognitionConfig,
    #[serde(default)]
    location: LocationConfig,
    #[serde(default)]
    egress: EgressConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    recognition_base_url: String,
    recognition_timeout_ms: u64,
    location_mode: LocationMode,
    location_latitude: Option<f64>,
    location_longitude: Option<f64>,
    egress_file: String,
    egress_enabled: bool,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, source: &str) -> Self {
        Self {
            recognition_base_url: toml_config.recognition.base_url,
            recognition_timeout_ms: toml_config.recognition.timeout_ms,
            location_mode: toml_config.location.mode,
            location_latitude: toml_config.location.latitude,
            location_longitude: toml_config.location.longitude,
            egress_file: toml_config.egress.file,
            egress_enabled: toml_config.egress.enabled,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: source.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn recognition_base_url(&self) -> &str {
        &self.recognition_base_url
    }

    pub fn recognition_timeout_ms(&self) -> u64 {
        self.recognition_timeout_ms
    }

    pub fn location_mode(&self) -> &LocationMode {
        &self.location_mode
    }

    pub fn location_latitude(&self) -> Option<f64> {
        self.location_latitude
    }

    pub fn location_longitude(&self) -> Option<f64> {
        self.location_longitude
    }

    pub fn egress_file(&self) -> &str {
        &self.egress_file
    }

    pub fn egress_enabled(&self) -> bool {
        self.egress_enabled
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a different endpoint
    #[cfg(test)]
    pub fn with_recognition_base_url(mut self, url: &str) -> Self {
        self.recognition_base_url = url.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.recognition_base_url(), "http://127.0.0.1:5002");
        assert_eq!(config.recognition_timeout_ms(), 10_000);
        assert_eq!(config.location_mode(), &LocationMode::Unavailable);
        assert_eq!(config.egress_file(), "analyses.jsonl");
        assert!(config.egress_enabled());
        assert_eq!(config.metrics_interval_secs(), 10);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[recognition]
base_url = "http://10.0.0.7:5002"
timeout_ms = 5000

[location]
mode = "fixed"
latitude = 31.4812
longitude = 74.3031

[egress]
enabled = false
file = "out/results.jsonl"

[metrics]
interval_secs = 30
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline");

        assert_eq!(config.recognition_base_url(), "http://10.0.0.7:5002");
        assert_eq!(config.recognition_timeout_ms(), 5000);
        assert_eq!(config.location_mode(), &LocationMode::Fixed);
        assert_eq!(config.location_latitude(), Some(31.4812));
        assert!(!config.egress_enabled());
        assert_eq!(config.egress_file(), "out/results.jsonl");
        assert_eq!(config.metrics_interval_secs(), 30);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[recognition]
base_url = "http://campus.example:5002"
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline");

        assert_eq!(config.recognition_base_url(), "http://campus.example:5002");
        assert_eq!(config.recognition_timeout_ms(), 10_000);
        assert_eq!(config.location_mode(), &LocationMode::Unavailable);
    }
}
