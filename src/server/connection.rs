use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use crate::config::AckMode;
use crate::engine::errors::EngineError;
use crate::metrics::EngineCounters;
use crate::models::Order;
use crate::protocol::{InputCodec, InputRecord};

/// Read loop for one client stream
///
/// Decodes records, turns them into orders and hands them to the dispatcher
/// in the order they were read. In [`AckMode::Sync`] the next record is only
/// read once the previous order has been processed by its worker.
pub struct Connection<S> {
    framed: FramedRead<S, InputCodec>,
    orders: mpsc::Sender<Order>,
    ack_mode: AckMode,
    shutdown: CancellationToken,
    counters: Arc<EngineCounters>,
}

impl<S> Connection<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(
        stream: S,
        orders: mpsc::Sender<Order>,
        ack_mode: AckMode,
        shutdown: CancellationToken,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            framed: FramedRead::new(stream, InputCodec::new()),
            orders,
            ack_mode,
            shutdown,
            counters,
        }
    }

    /// Run until the peer closes the stream, a read fails or shutdown fires
    ///
    /// `Ok(())` means a clean end of stream. Errors are local to this
    /// connection; use [`EngineError::is_shutdown`] to tell expected closures
    /// apart from transport failures.
    pub async fn run(mut self) -> Result<(), EngineError> {
        loop {
            let frame = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return Err(EngineError::ShuttingDown),
                frame = self.framed.next() => frame,
            };

            let record = match frame {
                Some(Ok(record)) => record,
                Some(Err(e)) => return Err(e.into()),
                None => break,
            };

            match self.submit(record).await {
                Ok(()) => {}
                Err(e) if e.is_protocol_error() => {
                    EngineCounters::incr(&self.counters.protocol_errors);
                    tracing::warn!("Dropping record: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let truncated = self.framed.decoder().truncated_records();
        self.counters.protocol_errors.fetch_add(truncated, Ordering::Relaxed);

        Ok(())
    }

    /// Hand one record to the dispatcher, waiting for its worker in sync mode
    async fn submit(&mut self, record: InputRecord) -> Result<(), EngineError> {
        let order = record.into_order()?;
        EngineCounters::incr(&self.counters.orders_received);

        match self.ack_mode {
            AckMode::Async => self.forward(order).await,
            AckMode::Sync => {
                let (order, done) = order.with_completion();
                self.forward(order).await?;

                tokio::select! {
                    biased;

                    _ = self.shutdown.cancelled() => Err(EngineError::ShuttingDown),
                    result = done => result.map_err(|_| EngineError::DispatcherClosed),
                }
            }
        }
    }

    async fn forward(&mut self, order: Order) -> Result<(), EngineError> {
        self.orders
            .send(order)
            .await
            .map_err(|_| EngineError::DispatcherClosed)
    }
}
