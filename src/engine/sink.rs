use std::io::Write;
use tokio::sync::mpsc;

use crate::config::OutputFormat;
use crate::models::EngineEvent;

/// Destination for events emitted by workers and the dispatcher
///
/// Shared as `Arc<dyn EventSink>` by every actor, so implementations must be
/// safe to call from many tasks at once.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Writes one line per event to stdout
pub struct StdoutSink {
    format: OutputFormat,
}

impl StdoutSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl EventSink for StdoutSink {
    fn emit(&self, event: EngineEvent) {
        let line = match self.format {
            OutputFormat::Text => event.to_string(),
            OutputFormat::Json => match event.to_json() {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize event {:?}: {}", event, e);
                    return;
                }
            },
        };

        // Holding the lock for the whole line keeps lines from interleaving
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            tracing::warn!("Failed to write event: {}", e);
        }
    }
}

/// Forwards events into an unbounded channel
///
/// Used by tests and by embedders that consume events in-process.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    /// Returns (sink, receiver) where receiver yields every emitted event
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();

        sink.emit(EngineEvent::deleted(1, true));
        sink.emit(EngineEvent::deleted(2, false));

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(matches!(first, EngineEvent::OrderDeleted { order_id: 1, accepted: true, .. }));
        assert!(matches!(second, EngineEvent::OrderDeleted { order_id: 2, accepted: false, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);

        sink.emit(EngineEvent::deleted(1, true));
    }
}
