use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::metrics::LatencyTracker;
use crate::models::{InstrumentBook, Order};

use super::errors::EngineError;
use super::matching::{process_order, OrderOutcome};
use super::sink::EventSink;

/// Sending side of a worker's queue, held by the dispatcher
///
/// Dropping every handle for an instrument lets its worker drain the queue
/// and exit.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    instrument: String,
    sender: mpsc::Sender<Order>,
}

impl WorkerHandle {
    /// Spawn the worker that exclusively owns `instrument`'s book
    ///
    /// The task is registered on `tracker` so shutdown can wait for it.
    pub fn spawn(
        instrument: String,
        capacity: usize,
        sink: Arc<dyn EventSink>,
        tracker: &TaskTracker,
    ) -> Self {
        let (sender, inbox) = mpsc::channel(capacity);

        let worker = Worker {
            book: InstrumentBook::new(instrument.clone()),
            inbox,
            sink,
            latency: LatencyTracker::new()
                .map_err(|e| tracing::warn!("Latency tracking disabled for {}: {}", instrument, e))
                .ok(),
        };
        tracker.spawn(worker.run());

        tracing::debug!("Worker spawned for {}", instrument);

        Self { instrument, sender }
    }

    /// Enqueue an order, waiting while the queue is full
    pub async fn submit(&self, order: Order) -> Result<(), EngineError> {
        self.sender
            .send(order)
            .await
            .map_err(|_| EngineError::WorkerClosed(self.instrument.clone()))
    }
}

/// Single-threaded owner of one instrument's book
struct Worker {
    book: InstrumentBook,
    inbox: mpsc::Receiver<Order>,
    sink: Arc<dyn EventSink>,
    latency: Option<LatencyTracker>,
}

impl Worker {
    /// Process orders in arrival order until every sender is gone and the
    /// queue is empty
    async fn run(mut self) {
        let mut processed: u64 = 0;
        let mut executions: u64 = 0;

        while let Some(order) = self.inbox.recv().await {
            let started = Instant::now();

            match process_order(&mut self.book, order, self.sink.as_ref()) {
                OrderOutcome::Rested { executions: n, .. } | OrderOutcome::Filled { executions: n } => {
                    executions += u64::from(n);
                }
                OrderOutcome::Deleted { .. } => {}
            }
            processed += 1;

            if let Some(latency) = self.latency.as_mut() {
                latency.record_since(started);
            }
        }

        match self.latency.as_ref().map(LatencyTracker::stats) {
            Some(stats) => tracing::debug!(
                instrument = %self.book.instrument,
                processed,
                executions,
                resting = self.book.resting_orders(),
                p50_us = stats.p50_us(),
                p99_us = stats.p99_us(),
                max_us = stats.max_us(),
                "Worker drained"
            ),
            None => tracing::debug!(
                instrument = %self.book.instrument,
                processed,
                executions,
                "Worker drained"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sink::ChannelSink;
    use crate::models::EngineEvent;

    #[tokio::test]
    async fn test_worker_processes_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        let tracker = TaskTracker::new();
        let handle = WorkerHandle::spawn("ABC".to_string(), 8, Arc::new(sink), &tracker);

        handle.submit(Order::buy(1, "ABC", 100, 10)).await.unwrap();
        handle.submit(Order::sell(2, "ABC", 100, 4)).await.unwrap();
        handle.submit(Order::cancel(1)).await.unwrap();

        drop(handle);
        tracker.close();
        tracker.wait().await;

        let events: Vec<EngineEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], EngineEvent::OrderAdded { order_id: 1, .. }));
        assert!(matches!(
            events[1],
            EngineEvent::OrderExecuted { resting_order_id: 1, incoming_order_id: 2, quantity: 4, .. }
        ));
        assert!(matches!(events[2], EngineEvent::OrderDeleted { order_id: 1, accepted: true, .. }));
    }

    #[tokio::test]
    async fn test_completion_signalled_after_processing() {
        let (sink, mut rx) = ChannelSink::new();
        let tracker = TaskTracker::new();
        let handle = WorkerHandle::spawn("XYZ".to_string(), 1, Arc::new(sink), &tracker);

        let (order, done) = Order::sell(5, "XYZ", 20, 3).with_completion();
        handle.submit(order).await.unwrap();
        done.await.unwrap();

        // The event is emitted before the completion fires
        assert!(matches!(rx.try_recv().unwrap(), EngineEvent::OrderAdded { order_id: 5, .. }));
    }

    #[tokio::test]
    async fn test_submit_fails_once_worker_is_gone() {
        let (sender, inbox) = mpsc::channel(1);
        drop(inbox);
        let handle = WorkerHandle {
            instrument: "ABC".to_string(),
            sender,
        };

        let err = handle.submit(Order::buy(1, "ABC", 1, 1)).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkerClosed(ref name) if name == "ABC"));
        assert!(err.is_shutdown());
    }
}
