// Library Crate Root
// lib.rs

// main.rs and the bins import through lib.rs like an external crate
pub mod config;
pub mod engine;
pub mod metrics;
pub mod models;
pub mod protocol;
pub mod server;

// pub use = re-export at crate root
pub use config::{AckMode, EngineConfig, OutputFormat};
pub use engine::{ChannelSink, Engine, EngineError, EventSink, ShutdownReport, StdoutSink};
pub use models::{EngineEvent, InstrumentBook, Order, OrderId, OrderSide, PriceQueue};
