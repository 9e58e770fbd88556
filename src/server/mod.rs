//! Client-facing transport
//!
//! - `connection` - Per-client read/decode/route loop

pub mod connection;

pub use connection::Connection;
