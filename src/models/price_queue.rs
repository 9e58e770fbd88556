use std::collections::VecDeque;

use super::order::{Order, OrderId};

/// Which end of the price range wins on a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSide {
    /// Higher price first
    Bid,
    /// Lower price first
    Ask,
}

/// Resting orders for one side of one instrument's book
///
/// Kept sorted by price priority, then arrival order among equal prices.
/// The head of the queue is always the best order.
#[derive(Debug)]
pub struct PriceQueue {
    side: QueueSide,
    orders: VecDeque<Order>,
}

impl PriceQueue {
    pub fn new(side: QueueSide) -> Self {
        Self {
            side,
            orders: VecDeque::new(),
        }
    }

    pub fn bids() -> Self {
        Self::new(QueueSide::Bid)
    }

    pub fn asks() -> Self {
        Self::new(QueueSide::Ask)
    }

    pub fn side(&self) -> QueueSide {
        self.side
    }

    /// True when `incoming` has a strictly better price than `current`
    fn outranks(&self, incoming: &Order, current: &Order) -> bool {
        match self.side {
            QueueSide::Bid => incoming.price > current.price,
            QueueSide::Ask => incoming.price < current.price,
        }
    }

    /// Insert an order behind every order it does not strictly outrank
    ///
    /// Scans from the tail, so an order at an existing price lands after all
    /// orders already resting at that price. Filled orders are never queued.
    pub fn push(&mut self, order: Order) {
        if order.is_filled() {
            return;
        }

        let mut position = self.orders.len();
        while position > 0 && self.outranks(&order, &self.orders[position - 1]) {
            position -= 1;
        }
        self.orders.insert(position, order);
    }

    /// Best resting order without removing it
    pub fn peek(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Best resting order, mutable for fills
    pub fn peek_mut(&mut self) -> Option<&mut Order> {
        self.orders.front_mut()
    }

    /// Remove and return the best resting order
    pub fn pop(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    /// Remove the order with this id wherever it rests
    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        // .position finds the index of the first order that matches
        let position = self.orders.iter().position(|order| order.id == id)?;
        self.orders.remove(position)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.iter().any(|order| order.id == id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Resting orders from best to worst
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Total unfilled quantity resting on this side
    pub fn depth(&self) -> u64 {
        self.orders.iter().map(|order| u64::from(order.remaining_count)).sum()
    }
}
