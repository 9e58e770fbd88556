use hdrhistogram::{CreationError, Histogram};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Highest latency the histogram tracks: 10 seconds
const MAX_TRACKABLE_NS: u64 = 10_000_000_000;

/// Significant figures kept per recorded value
const SIGNIFICANT_FIGURES: u8 = 3;

/// Per-worker order processing latency, backed by an HDR histogram
///
/// HDR histograms give accurate percentiles in constant memory, so every
/// worker can own one without coordination.
pub struct LatencyTracker {
    processing_ns: Histogram<u64>,
}

impl LatencyTracker {
    /// Configure histogram: 1ns to 10 seconds, 3 significant figures
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            processing_ns: Histogram::new_with_bounds(1, MAX_TRACKABLE_NS, SIGNIFICANT_FIGURES)?,
        })
    }

    /// Record the time elapsed since `start`
    #[inline]
    pub fn record_since(&mut self, start: Instant) {
        let nanos = start.elapsed().as_nanos().min(u128::from(MAX_TRACKABLE_NS)) as u64;
        self.record_ns(nanos);
    }

    /// Record a raw sample, clamped into the trackable range
    #[inline]
    pub fn record_ns(&mut self, nanos: u64) {
        let _ = self.processing_ns.record(nanos.clamp(1, MAX_TRACKABLE_NS));
    }

    /// Get latency statistics for order processing
    pub fn stats(&self) -> LatencyStats {
        LatencyStats {
            p50_ns: self.processing_ns.value_at_percentile(50.0),
            p99_ns: self.processing_ns.value_at_percentile(99.0),
            max_ns: self.processing_ns.max(),
            mean_ns: self.processing_ns.mean(),
            sample_count: self.processing_ns.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50_ns: u64,
    pub p99_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
    pub sample_count: u64,
}

impl LatencyStats {
    /// Convert nanoseconds to microseconds for display
    pub fn p50_us(&self) -> f64 {
        self.p50_ns as f64 / 1000.0
    }

    pub fn p99_us(&self) -> f64 {
        self.p99_ns as f64 / 1000.0
    }

    pub fn max_us(&self) -> f64 {
        self.max_ns as f64 / 1000.0
    }
}
