//! Error types for the matching engine
//!
//! Centralizes the error taxonomy so connections, the dispatcher and the
//! wire protocol classify failures the same way.

use std::io;
use thiserror::Error;

use crate::models::OrderId;

/// Errors raised while decoding a client record into an order
///
/// Protocol errors drop the offending record; the connection keeps reading.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Command code is not one of 'B', 'S', 'C'
    #[error("Unknown command code: {0:#x}")]
    UnknownSide(u32),

    /// Buy or sell record without an instrument name
    #[error("Missing instrument for order {0}")]
    MissingInstrument(OrderId),

    /// Instrument field lacks its NUL terminator or is not valid UTF-8
    #[error("Malformed instrument for order {0}")]
    InvalidInstrument(OrderId),
}

/// Errors that can occur while running the engine
///
/// # Error Categories
///
/// - **Transport Errors**: `Io` (local to one connection)
/// - **Protocol Errors**: `Protocol` (record dropped, connection continues)
/// - **Shutdown**: `DispatcherClosed`, `WorkerClosed`, `ShuttingDown`
/// - **Startup Errors**: `Config`
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The dispatcher stopped accepting orders
    #[error("Dispatcher is closed")]
    DispatcherClosed,

    /// The worker for an instrument stopped accepting orders
    #[error("Worker for instrument {0} is closed")]
    WorkerClosed(String),

    /// Shutdown was signalled while waiting
    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Returns true if this error is an expected consequence of shutdown
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            EngineError::DispatcherClosed | EngineError::WorkerClosed(_) | EngineError::ShuttingDown
        )
    }

    /// Returns true if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, EngineError::Io(_))
    }

    /// Returns true if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, EngineError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::WorkerClosed("ABC".to_string());
        assert_eq!(err.to_string(), "Worker for instrument ABC is closed");

        let err = EngineError::from(ProtocolError::UnknownSide(0x5a));
        assert_eq!(err.to_string(), "Protocol error: Unknown command code: 0x5a");
    }

    #[test]
    fn test_error_categories() {
        assert!(EngineError::DispatcherClosed.is_shutdown());
        assert!(EngineError::ShuttingDown.is_shutdown());
        assert!(EngineError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_transport_error());
        assert!(EngineError::from(ProtocolError::MissingInstrument(1)).is_protocol_error());
        assert!(!EngineError::Config("x".to_string()).is_shutdown());
    }
}
