pub mod book;
pub mod event;
pub mod order;
pub mod price_queue;

pub use book::InstrumentBook;
pub use event::{current_timestamp, EngineEvent};
pub use order::{Order, OrderId, OrderSide};
pub use price_queue::{PriceQueue, QueueSide};
