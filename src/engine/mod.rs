//! Matching Engine Module
//!
//! This module contains the concurrent order-processing pipeline:
//! - `errors` - Error types for the wire protocol and engine lifecycle
//! - `sink` - Destinations for emitted events
//! - `matching` - Price-time priority matching over one instrument's book
//! - `worker` - Per-instrument actor owning a book
//! - `dispatcher` - Routes orders to workers and resolves cancels
//! - `lifecycle` - Engine start/accept/shutdown

pub mod dispatcher;
pub mod errors;
pub mod lifecycle;
pub mod matching;
pub mod sink;
pub mod worker;

// Re-export commonly used types for convenience
pub use dispatcher::{Dispatcher, DispatcherSummary};
pub use errors::{EngineError, ProtocolError};
pub use lifecycle::{Engine, ShutdownReport};
pub use matching::{process_order, OrderOutcome};
pub use sink::{ChannelSink, EventSink, StdoutSink};
pub use worker::WorkerHandle;
