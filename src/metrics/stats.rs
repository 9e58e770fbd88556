use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters shared by the engine's tasks
///
/// Counters only; no book state is ever shared between tasks.
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub connections_accepted: AtomicU64,
    pub orders_received: AtomicU64,
    pub orders_routed: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub unknown_cancels: AtomicU64,
    pub instruments: AtomicU64,
}

impl EngineCounters {
    #[inline]
    pub fn incr(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            orders_received: self.orders_received.load(Ordering::Relaxed),
            orders_routed: self.orders_routed.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            unknown_cancels: self.unknown_cancels.load(Ordering::Relaxed),
            instruments: self.instruments.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Connections accepted (lifetime)
    pub connections_accepted: u64,
    /// Records decoded into orders
    pub orders_received: u64,
    /// Orders handed to a worker
    pub orders_routed: u64,
    /// Records dropped as malformed
    pub protocol_errors: u64,
    /// Cancels rejected because the id was never seen
    pub unknown_cancels: u64,
    /// Workers spawned, one per instrument
    pub instruments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let counters = EngineCounters::default();
        EngineCounters::incr(&counters.orders_received);
        EngineCounters::incr(&counters.orders_received);
        EngineCounters::incr(&counters.instruments);

        let stats = counters.snapshot();
        assert_eq!(stats.orders_received, 2);
        assert_eq!(stats.instruments, 1);
        assert_eq!(stats.orders_routed, 0);
    }
}
