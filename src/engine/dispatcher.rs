use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::metrics::EngineCounters;
use crate::models::{EngineEvent, Order, OrderId, OrderSide};

use super::sink::EventSink;
use super::worker::WorkerHandle;

/// What the dispatcher knew when it exited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherSummary {
    /// Distinct instruments that got a worker
    pub instruments: usize,
    /// Order ids with a recorded instrument
    pub tracked_orders: usize,
}

/// Single routing point between connections and workers
///
/// Every decoded order from every connection passes through one dispatcher
/// task. It records which instrument each buy/sell id belongs to so cancels,
/// which carry only an id, can be routed. It also creates the worker for an
/// instrument the first time the instrument is seen. Both maps are owned by
/// this task alone.
///
/// # Example
/// ```ignore
/// let (dispatcher, orders_tx) = Dispatcher::new(1024, 1000, sink, token, counters, workers);
/// tokio::spawn(dispatcher.run());
///
/// orders_tx.send(Order::buy(1, "ABC", 100, 10)).await?;
/// ```
pub struct Dispatcher {
    inbox: mpsc::Receiver<Order>,
    /// Never pruned on fill or cancel; grows for the life of the process
    order_instruments: HashMap<OrderId, String>,
    workers: HashMap<String, WorkerHandle>,
    worker_capacity: usize,
    sink: Arc<dyn EventSink>,
    shutdown: CancellationToken,
    counters: Arc<EngineCounters>,
    worker_tasks: TaskTracker,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// Returns (dispatcher, sender) where sender is cloned into every connection
    pub fn new(
        dispatch_capacity: usize,
        worker_capacity: usize,
        sink: Arc<dyn EventSink>,
        shutdown: CancellationToken,
        counters: Arc<EngineCounters>,
        worker_tasks: TaskTracker,
    ) -> (Self, mpsc::Sender<Order>) {
        let (orders_tx, inbox) = mpsc::channel(dispatch_capacity);

        let dispatcher = Self {
            inbox,
            order_instruments: HashMap::new(),
            workers: HashMap::new(),
            worker_capacity,
            sink,
            shutdown,
            counters,
            worker_tasks,
        };

        (dispatcher, orders_tx)
    }

    /// Route orders until every sender is gone or shutdown is signalled
    ///
    /// On shutdown the inbox is closed and whatever is already queued is
    /// still routed. Workers are then released and awaited, so this future
    /// only completes once every book has processed its last order.
    pub async fn run(mut self) -> DispatcherSummary {
        tracing::info!("🔀 Dispatcher started");

        loop {
            tokio::select! {
                biased;

                order = self.inbox.recv() => match order {
                    Some(order) => self.route(order).await,
                    None => break,
                },
                _ = self.shutdown.cancelled() => {
                    self.inbox.close();
                    while let Some(order) = self.inbox.recv().await {
                        self.route(order).await;
                    }
                    break;
                }
            }
        }

        let summary = DispatcherSummary {
            instruments: self.workers.len(),
            tracked_orders: self.order_instruments.len(),
        };

        // Dropping the handles closes every worker queue; workers drain and exit
        self.workers.clear();
        self.worker_tasks.close();
        self.worker_tasks.wait().await;

        tracing::info!(
            instruments = summary.instruments,
            tracked_orders = summary.tracked_orders,
            "🔀 Dispatcher stopped, all workers drained"
        );

        summary
    }

    /// Forward one order to the worker owning its instrument
    async fn route(&mut self, mut order: Order) {
        let Some(instrument) = self.resolve_instrument(&order) else {
            // Never seen this id, so no worker can be identified
            tracing::debug!(order_id = order.id, "Cancel for unknown order rejected");
            EngineCounters::incr(&self.counters.unknown_cancels);
            self.sink.emit(EngineEvent::deleted(order.id, false));
            order.complete();
            return;
        };

        if !self.workers.contains_key(&instrument) {
            let handle = WorkerHandle::spawn(
                instrument.clone(),
                self.worker_capacity,
                Arc::clone(&self.sink),
                &self.worker_tasks,
            );
            EngineCounters::incr(&self.counters.instruments);
            tracing::info!("🔀 New instrument: {}", instrument);
            self.workers.insert(instrument.clone(), handle);
        }

        let Some(worker) = self.workers.get(&instrument) else {
            return;
        };

        match worker.submit(order).await {
            Ok(()) => {
                EngineCounters::incr(&self.counters.orders_routed);
            }
            Err(e) => {
                tracing::error!("Failed to route order: {}", e);
            }
        }
    }

    /// Instrument an order belongs to
    ///
    /// Buy and sell orders record their id; a later order reusing the id
    /// overwrites the mapping. Cancels look the id up and yield `None` when
    /// it was never seen.
    fn resolve_instrument(&mut self, order: &Order) -> Option<String> {
        match order.side {
            OrderSide::Cancel => self.order_instruments.get(&order.id).cloned(),
            OrderSide::Buy | OrderSide::Sell => {
                let previous = self
                    .order_instruments
                    .insert(order.id, order.instrument.clone());
                if let Some(previous) = previous.filter(|p| *p != order.instrument) {
                    tracing::debug!(
                        order_id = order.id,
                        previous = %previous,
                        instrument = %order.instrument,
                        "Order id reused, mapping overwritten"
                    );
                }
                Some(order.instrument.clone())
            }
        }
    }
}
