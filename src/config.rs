use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::errors::EngineError;

/// When a connection reads its next record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Wait until the owning worker has processed the order
    #[default]
    Sync,
    /// Read on as soon as the dispatcher has accepted the order
    Async,
}

impl FromStr for AckMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(AckMode::Sync),
            "async" => Ok(AckMode::Async),
            other => Err(EngineError::Config(format!("unknown ack mode '{}'", other))),
        }
    }
}

/// Rendering of output events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Space separated lines, one per event
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(EngineError::Config(format!("unknown output format '{}'", other))),
        }
    }
}

/// Runtime configuration for the engine
///
/// # Environment Variables
///
/// - `ENGINE_SOCKET_PATH`: Unix socket to listen on (argv[1] takes precedence)
/// - `ENGINE_DISPATCH_QUEUE`: dispatcher inbox capacity (default: 1024)
/// - `ENGINE_WORKER_QUEUE`: per-instrument worker queue capacity (default: 1000)
/// - `ENGINE_ACK_MODE`: `sync` or `async` (default: sync)
/// - `ENGINE_OUTPUT_FORMAT`: `text` or `json` (default: text)
/// - `ENGINE_SHUTDOWN_TIMEOUT_MS`: grace period for draining (default: 5000)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub socket_path: Option<PathBuf>,
    pub dispatch_queue_capacity: usize,
    pub worker_queue_capacity: usize,
    pub ack_mode: AckMode,
    pub output_format: OutputFormat,
    pub shutdown_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            dispatch_queue_capacity: 1024,
            worker_queue_capacity: 1000,
            ack_mode: AckMode::Sync,
            output_format: OutputFormat::Text,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl EngineConfig {
    /// Create with configuration from environment variables
    pub fn with_env_config() -> Result<Self, EngineError> {
        let defaults = Self::default();

        let config = Self {
            socket_path: std::env::var_os("ENGINE_SOCKET_PATH").map(PathBuf::from),
            dispatch_queue_capacity: env_or("ENGINE_DISPATCH_QUEUE", defaults.dispatch_queue_capacity)?,
            worker_queue_capacity: env_or("ENGINE_WORKER_QUEUE", defaults.worker_queue_capacity)?,
            ack_mode: env_or("ENGINE_ACK_MODE", defaults.ack_mode)?,
            output_format: env_or("ENGINE_OUTPUT_FORMAT", defaults.output_format)?,
            shutdown_timeout_ms: env_or("ENGINE_SHUTDOWN_TIMEOUT_MS", defaults.shutdown_timeout_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Override the socket path, e.g. from the command line
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Reject capacities tokio channels cannot be built with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.dispatch_queue_capacity == 0 {
            return Err(EngineError::Config("dispatch queue capacity must be positive".into()));
        }
        if self.worker_queue_capacity == 0 {
            return Err(EngineError::Config("worker queue capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Parse an environment variable, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> Result<T, EngineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| EngineError::Config(format!("{}={}: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.dispatch_queue_capacity, 1024);
        assert_eq!(config.worker_queue_capacity, 1000);
        assert_eq!(config.ack_mode, AckMode::Sync);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("async".parse::<AckMode>().unwrap(), AckMode::Async);
        assert_eq!(" SYNC ".parse::<AckMode>().unwrap(), AckMode::Sync);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("later".parse::<AckMode>().is_err());
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig {
            worker_queue_capacity: 0,
            ..EngineConfig::default()
        };

        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_socket_path_override() {
        let config = EngineConfig::default().with_socket_path("/tmp/engine.sock");
        assert_eq!(config.socket_path, Some(PathBuf::from("/tmp/engine.sock")));
    }
}
