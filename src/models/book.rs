use super::order::OrderId;
use super::price_queue::PriceQueue;

/// One instrument's book: a bid queue and an ask queue
///
/// Owned exclusively by the worker for that instrument.
#[derive(Debug)]
pub struct InstrumentBook {
    pub instrument: String,
    pub bids: PriceQueue,
    pub asks: PriceQueue,
}

impl InstrumentBook {
    /// Create an empty book for an instrument
    pub fn new(instrument: String) -> Self {
        Self {
            instrument,
            bids: PriceQueue::bids(),
            asks: PriceQueue::asks(),
        }
    }

    /// Get the best bid price (highest buy price)
    pub fn best_bid(&self) -> Option<u32> {
        self.bids.peek().map(|order| order.price)
    }

    /// Get the best ask price (lowest sell price)
    pub fn best_ask(&self) -> Option<u32> {
        self.asks.peek().map(|order| order.price)
    }

    /// Get the spread (difference between best ask and best bid)
    pub fn spread(&self) -> Option<i64> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(i64::from(ask) - i64::from(bid)),
            _ => None,
        }
    }

    /// Check whether an order with this id rests on either side
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.bids.contains(order_id) || self.asks.contains(order_id)
    }

    /// Number of resting orders across both sides
    pub fn resting_orders(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Get total depth on bid side
    pub fn bid_depth(&self) -> u64 {
        self.bids.depth()
    }

    /// Get total depth on ask side
    pub fn ask_depth(&self) -> u64 {
        self.asks.depth()
    }
}
