pub mod latency;
pub mod stats;

pub use latency::{LatencyStats, LatencyTracker};
pub use stats::{EngineCounters, EngineStats};
