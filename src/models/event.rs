use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::{OrderId, OrderSide};

/// Events emitted by the engine as a side effect of processing orders
///
/// Every event carries a timestamp in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An order (or its unfilled remainder) now rests in a book
    OrderAdded {
        side: OrderSide,
        order_id: OrderId,
        instrument: String,
        price: u32,
        count: u32,
        timestamp: i64,
    },
    /// A resting order traded against an incoming order at the resting price
    OrderExecuted {
        resting_order_id: OrderId,
        incoming_order_id: OrderId,
        execution_sequence: u32,
        price: u32,
        quantity: u32,
        timestamp: i64,
    },
    /// Outcome of a cancel request
    OrderDeleted {
        order_id: OrderId,
        accepted: bool,
        timestamp: i64,
    },
}

impl EngineEvent {
    pub fn added(side: OrderSide, order_id: OrderId, instrument: &str, price: u32, count: u32) -> Self {
        EngineEvent::OrderAdded {
            side,
            order_id,
            instrument: instrument.to_string(),
            price,
            count,
            timestamp: current_timestamp(),
        }
    }

    pub fn executed(
        resting_order_id: OrderId,
        incoming_order_id: OrderId,
        execution_sequence: u32,
        price: u32,
        quantity: u32,
    ) -> Self {
        EngineEvent::OrderExecuted {
            resting_order_id,
            incoming_order_id,
            execution_sequence,
            price,
            quantity,
            timestamp: current_timestamp(),
        }
    }

    pub fn deleted(order_id: OrderId, accepted: bool) -> Self {
        EngineEvent::OrderDeleted {
            order_id,
            accepted,
            timestamp: current_timestamp(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            EngineEvent::OrderAdded { timestamp, .. }
            | EngineEvent::OrderExecuted { timestamp, .. }
            | EngineEvent::OrderDeleted { timestamp, .. } => *timestamp,
        }
    }

    /// Render as a single JSON object
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Text output line, one event per line
impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::OrderAdded { side, order_id, instrument, price, count, timestamp } => write!(
                f,
                "{} {} {} {} {} {}",
                side.code(),
                order_id,
                instrument,
                price,
                count,
                timestamp
            ),
            EngineEvent::OrderExecuted {
                resting_order_id,
                incoming_order_id,
                execution_sequence,
                price,
                quantity,
                timestamp,
            } => write!(
                f,
                "E {} {} {} {} {} {}",
                resting_order_id, incoming_order_id, execution_sequence, price, quantity, timestamp
            ),
            EngineEvent::OrderDeleted { order_id, accepted, timestamp } => {
                let verdict = if *accepted { 'A' } else { 'R' };
                write!(f, "X {} {} {}", order_id, verdict, timestamp)
            }
        }
    }
}

/// Nanoseconds since the Unix epoch
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0)
}
