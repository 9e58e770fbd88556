use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Client-assigned order identifier, unique per owner
pub type OrderId = u32;

/// Order side: Buy, Sell, or a Cancel of a previously submitted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
    Cancel,
}

impl OrderSide {
    /// ASCII command code used on the wire and in output lines
    pub fn code(&self) -> char {
        match self {
            OrderSide::Buy => 'B',
            OrderSide::Sell => 'S',
            OrderSide::Cancel => 'C',
        }
    }

    /// Parse the wire command code
    pub fn from_code(code: u32) -> Option<Self> {
        match char::from_u32(code)? {
            'B' => Some(OrderSide::Buy),
            'S' => Some(OrderSide::Sell),
            'C' => Some(OrderSide::Cancel),
            _ => None,
        }
    }
}

/// One order intent as it travels from a connection to the worker that owns
/// its instrument.
///
/// `instrument` is only meaningful for Buy/Sell; a Cancel carries the id of
/// the order it targets and nothing else. `remaining_count` is mutated while
/// matching and an order that reaches zero never rests in a book.
#[derive(Debug)]
pub struct Order {
    pub id: OrderId,
    pub instrument: String,
    pub price: u32,
    pub remaining_count: u32,
    pub side: OrderSide,
    /// Number of the next fill this order takes part in as the resting side
    pub execution_sequence: u32,
    /// Released once the owning worker has finished processing the order
    completion: Option<oneshot::Sender<()>>,
}

impl Order {
    /// Create a new order with a fresh execution sequence
    pub fn new(side: OrderSide, id: OrderId, instrument: String, price: u32, count: u32) -> Self {
        Self {
            id,
            instrument,
            price,
            remaining_count: count,
            side,
            execution_sequence: 1,
            completion: None,
        }
    }

    pub fn buy(id: OrderId, instrument: &str, price: u32, count: u32) -> Self {
        Self::new(OrderSide::Buy, id, instrument.to_string(), price, count)
    }

    pub fn sell(id: OrderId, instrument: &str, price: u32, count: u32) -> Self {
        Self::new(OrderSide::Sell, id, instrument.to_string(), price, count)
    }

    /// A cancel names only the target id; the dispatcher resolves the instrument
    pub fn cancel(id: OrderId) -> Self {
        Self::new(OrderSide::Cancel, id, String::new(), 0, 0)
    }

    /// Attach a one-shot completion signal and hand back its receiving end
    pub fn with_completion(mut self) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        (self, rx)
    }

    /// Detach the completion signal so it can be released after processing
    pub fn take_completion(&mut self) -> Option<oneshot::Sender<()>> {
        self.completion.take()
    }

    /// Release the completion signal if one is still attached
    pub fn complete(&mut self) {
        if let Some(done) = self.completion.take() {
            // The waiting connection may already be gone
            let _ = done.send(());
        }
    }

    /// Check if the order has nothing left to trade
    pub fn is_filled(&self) -> bool {
        self.remaining_count == 0
    }

    /// Take `quantity` off the remaining count
    pub fn fill(&mut self, quantity: u32) {
        self.remaining_count = self.remaining_count.saturating_sub(quantity);
    }

    pub fn is_cancel(&self) -> bool {
        self.side == OrderSide::Cancel
    }
}
