use crate::models::{EngineEvent, InstrumentBook, Order, OrderSide, PriceQueue};

use super::sink::EventSink;

// ============================================================================
// Outcome
// ============================================================================

/// What happened to an order once its worker processed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Unfilled remainder now rests in the book
    Rested { executions: u32, remaining: u32 },
    /// Fully filled by resting liquidity, never added
    Filled { executions: u32 },
    /// Cancel request resolved
    Deleted { accepted: bool },
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Apply one order to an instrument's book, emitting events to `sink`
///
/// The order's completion signal is released once processing is over,
/// whatever the outcome.
pub fn process_order(book: &mut InstrumentBook, mut order: Order, sink: &dyn EventSink) -> OrderOutcome {
    let completion = order.take_completion();

    let outcome = match order.side {
        OrderSide::Cancel => cancel_order(book, &order, sink),
        OrderSide::Buy | OrderSide::Sell => place_order(book, order, sink),
    };

    if let Some(done) = completion {
        let _ = done.send(());
    }

    outcome
}

// ============================================================================
// Cancel
// ============================================================================

/// Remove a resting order by id, bids first
fn cancel_order(book: &mut InstrumentBook, cancel: &Order, sink: &dyn EventSink) -> OrderOutcome {
    let removed = if book.bids.contains(cancel.id) {
        book.bids.remove(cancel.id)
    } else {
        book.asks.remove(cancel.id)
    };

    let accepted = removed.is_some();
    sink.emit(EngineEvent::deleted(cancel.id, accepted));

    OrderOutcome::Deleted { accepted }
}

// ============================================================================
// Buy / Sell
// ============================================================================

/// Match an incoming order against the opposite side, then rest any remainder
fn place_order(book: &mut InstrumentBook, mut incoming: Order, sink: &dyn EventSink) -> OrderOutcome {
    let (opposite, same) = match incoming.side {
        OrderSide::Buy => (&mut book.asks, &mut book.bids),
        _ => (&mut book.bids, &mut book.asks),
    };

    let executions = match_against(opposite, &mut incoming, sink);

    if incoming.is_filled() {
        return OrderOutcome::Filled { executions };
    }

    let remaining = incoming.remaining_count;
    sink.emit(EngineEvent::added(
        incoming.side,
        incoming.id,
        &incoming.instrument,
        incoming.price,
        remaining,
    ));
    same.push(incoming);

    OrderOutcome::Rested { executions, remaining }
}

/// Incoming buy crosses at or above the ask, incoming sell at or below the bid
fn price_matched(incoming: &Order, resting: &Order) -> bool {
    match incoming.side {
        OrderSide::Buy => incoming.price >= resting.price,
        _ => incoming.price <= resting.price,
    }
}

/// Trade the incoming order against the best resting orders until it is
/// filled, the queue runs dry, or prices stop crossing
///
/// Returns the number of executions.
fn match_against(opposite: &mut PriceQueue, incoming: &mut Order, sink: &dyn EventSink) -> u32 {
    let mut executions = 0;

    while !incoming.is_filled() {
        let Some(resting) = opposite.peek_mut() else {
            break;
        };

        // The queue is price-sorted, so nothing behind the head can cross either
        if !price_matched(incoming, resting) {
            break;
        }

        let quantity = incoming.remaining_count.min(resting.remaining_count);
        incoming.fill(quantity);
        resting.fill(quantity);

        sink.emit(EngineEvent::executed(
            resting.id,
            incoming.id,
            resting.execution_sequence,
            resting.price,
            quantity,
        ));
        resting.execution_sequence += 1;
        executions += 1;

        if resting.is_filled() {
            opposite.pop();
        }
    }

    executions
}

// ============================================================================
// Tests
// ============================================================================
