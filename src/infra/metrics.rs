//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::RecognitionFailure;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for analysis round-trip time (milliseconds).
/// Buckets: ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, >25600
pub const LATENCY_BUCKET_BOUNDS: [u64; 10] =
    [50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600];
pub const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    LATENCY_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets.
/// Returns the upper bound of the bucket containing the percentile.
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps interval counters to get a
/// consistent snapshot.
pub struct Metrics {
    /// Analyses ever started (monotonic)
    analyses_total: AtomicU64,
    /// Analyses since last report (reset on report)
    analyses_since_report: AtomicU64,
    /// Analyses that produced a LocationResult (monotonic)
    resolved_total: AtomicU64,
    /// Recognition failures by reason (monotonic)
    recognition_network_total: AtomicU64,
    recognition_rejected_total: AtomicU64,
    recognition_invalid_total: AtomicU64,
    /// Server returned a label outside the registry (monotonic)
    unknown_building_total: AtomicU64,
    /// No device fix and no server distance estimate (monotonic)
    distance_unavailable_total: AtomicU64,
    /// Geometry contract violations (should stay zero)
    geo_failure_total: AtomicU64,
    /// Resolutions that fell back to the server distance estimate (monotonic)
    server_distance_used_total: AtomicU64,
    /// Completions discarded because the session generation moved on
    stale_discarded_total: AtomicU64,
    /// Analysis round-trip histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of round-trip latencies in ms (reset on report)
    latency_sum_ms: AtomicU64,
    /// Max round-trip latency in ms (reset on report)
    latency_max_ms: AtomicU64,
    /// Last report time (only accessed from the reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            analyses_total: AtomicU64::new(0),
            analyses_since_report: AtomicU64::new(0),
            resolved_total: AtomicU64::new(0),
            recognition_network_total: AtomicU64::new(0),
            recognition_rejected_total: AtomicU64::new(0),
            recognition_invalid_total: AtomicU64::new(0),
            unknown_building_total: AtomicU64::new(0),
            distance_unavailable_total: AtomicU64::new(0),
            geo_failure_total: AtomicU64::new(0),
            server_distance_used_total: AtomicU64::new(0),
            stale_discarded_total: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_ms: AtomicU64::new(0),
            latency_max_ms: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record an analysis attempt being dispatched (lock-free)
    #[inline]
    pub fn record_analysis_started(&self) {
        self.analyses_total.fetch_add(1, Ordering::Relaxed);
        self.analyses_since_report.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful resolution with its round-trip latency (lock-free)
    #[inline]
    pub fn record_resolved(&self, latency_ms: u64) {
        self.resolved_total.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ms);
    }

    /// Record the round-trip latency of a settled analysis (lock-free)
    #[inline]
    pub fn record_latency(&self, latency_ms: u64) {
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        let bucket = bucket_index(latency_ms);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_recognition_failure(&self, reason: &RecognitionFailure) {
        match reason {
            RecognitionFailure::Network => {
                self.recognition_network_total.fetch_add(1, Ordering::Relaxed)
            }
            RecognitionFailure::ServerRejected { .. } => {
                self.recognition_rejected_total.fetch_add(1, Ordering::Relaxed)
            }
            RecognitionFailure::InvalidResponse => {
                self.recognition_invalid_total.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    #[inline]
    pub fn record_unknown_building(&self) {
        self.unknown_building_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_distance_unavailable(&self) {
        self.distance_unavailable_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_geo_failure(&self) {
        self.geo_failure_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_server_distance_used(&self) {
        self.server_distance_used_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_discarded(&self) {
        self.stale_discarded_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total analyses started
    #[inline]
    pub fn analyses_total(&self) -> u64 {
        self.analyses_total.load(Ordering::Relaxed)
    }

    /// Get total successful resolutions
    #[inline]
    pub fn resolved_total(&self) -> u64 {
        self.resolved_total.load(Ordering::Relaxed)
    }

    /// Get total stale completions discarded
    #[inline]
    pub fn stale_discarded_total(&self) -> u64 {
        self.stale_discarded_total.load(Ordering::Relaxed)
    }

    /// Produce a snapshot, resetting the interval counters
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *last = now;
            elapsed
        };

        let analyses_interval = self.analyses_since_report.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);
        let lat_sum = self.latency_sum_ms.swap(0, Ordering::Relaxed);
        let lat_max = self.latency_max_ms.swap(0, Ordering::Relaxed);
        let lat_count: u64 = lat_buckets.iter().sum();

        MetricsSummary {
            analyses_total: self.analyses_total.load(Ordering::Relaxed),
            analyses_per_min: if elapsed_secs > 0.0 {
                analyses_interval as f64 * 60.0 / elapsed_secs
            } else {
                0.0
            },
            resolved_total: self.resolved_total.load(Ordering::Relaxed),
            recognition_network_total: self.recognition_network_total.load(Ordering::Relaxed),
            recognition_rejected_total: self.recognition_rejected_total.load(Ordering::Relaxed),
            recognition_invalid_total: self.recognition_invalid_total.load(Ordering::Relaxed),
            unknown_building_total: self.unknown_building_total.load(Ordering::Relaxed),
            distance_unavailable_total: self.distance_unavailable_total.load(Ordering::Relaxed),
            geo_failure_total: self.geo_failure_total.load(Ordering::Relaxed),
            server_distance_used_total: self.server_distance_used_total.load(Ordering::Relaxed),
            stale_discarded_total: self.stale_discarded_total.load(Ordering::Relaxed),
            latency_avg_ms: if lat_count > 0 { lat_sum / lat_count } else { 0 },
            latency_p50_ms: percentile_from_buckets(&lat_buckets, 0.50),
            latency_p99_ms: percentile_from_buckets(&lat_buckets, 0.99),
            latency_max_ms: lat_max,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics over the last reporting interval
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub analyses_total: u64,
    pub analyses_per_min: f64,
    pub resolved_total: u64,
    pub recognition_network_total: u64,
    pub recognition_rejected_total: u64,
    pub recognition_invalid_total: u64,
    pub unknown_building_total: u64,
    pub distance_unavailable_total: u64,
    pub geo_failure_total: u64,
    pub server_distance_used_total: u64,
    pub stale_discarded_total: u64,
    pub latency_avg_ms: u64,
    pub latency_p50_ms: u64,
    pub latency_p99_ms: u64,
    pub latency_max_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            analyses_total = %self.analyses_total,
            analyses_per_min = format!("{:.1}", self.analyses_per_min),
            resolved_total = %self.resolved_total,
            rec_network = %self.recognition_network_total,
            rec_rejected = %self.recognition_rejected_total,
            rec_invalid = %self.recognition_invalid_total,
            unknown_building = %self.unknown_building_total,
            distance_unavailable = %self.distance_unavailable_total,
            geo_failures = %self.geo_failure_total,
            server_distance_used = %self.server_distance_used_total,
            stale_discarded = %self.stale_discarded_total,
            lat_avg_ms = %self.latency_avg_ms,
            lat_p50_ms = %self.latency_p50_ms,
            lat_p99_ms = %self.latency_p99_ms,
            lat_max_ms = %self.latency_max_ms,
            "metrics_summary"
        );
    }
}
