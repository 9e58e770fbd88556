use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::metrics::{EngineCounters, EngineStats};
use crate::models::Order;
use crate::server::Connection;

use super::dispatcher::{Dispatcher, DispatcherSummary};
use super::errors::EngineError;
use super::sink::EventSink;

/// What was still running when shutdown finished or gave up
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// Every task drained and exited within the timeout
    pub clean: bool,
    pub connections_alive: usize,
    pub dispatcher_alive: bool,
    pub workers_alive: usize,
    /// Instruments that had a worker
    pub instruments: usize,
    pub stats: EngineStats,
}

impl ShutdownReport {
    pub fn has_leaks(&self) -> bool {
        self.connections_alive > 0 || self.dispatcher_alive || self.workers_alive > 0
    }
}

/// Owns the dispatcher and every live connection
///
/// # Shutdown Order
///
/// 1. The shutdown token is cancelled; connections stop reading
/// 2. Connection tasks are awaited, then the last order sender is dropped
/// 3. The dispatcher routes what is queued, releases its workers and waits
///    until every worker has drained its queue
pub struct Engine {
    config: EngineConfig,
    orders_tx: mpsc::Sender<Order>,
    dispatcher: JoinHandle<DispatcherSummary>,
    connections: TaskTracker,
    workers: TaskTracker,
    shutdown: CancellationToken,
    counters: Arc<EngineCounters>,
}

impl Engine {
    /// Spawn the dispatcher; workers are created as instruments appear
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: EngineConfig, sink: Arc<dyn EventSink>) -> Result<Self, EngineError> {
        config.validate()?;

        let shutdown = CancellationToken::new();
        let counters = Arc::new(EngineCounters::default());
        let workers = TaskTracker::new();

        let (dispatcher, orders_tx) = Dispatcher::new(
            config.dispatch_queue_capacity,
            config.worker_queue_capacity,
            sink,
            shutdown.clone(),
            Arc::clone(&counters),
            workers.clone(),
        );
        let dispatcher = tokio::spawn(dispatcher.run());

        tracing::info!(
            ack_mode = ?config.ack_mode,
            dispatch_queue = config.dispatch_queue_capacity,
            worker_queue = config.worker_queue_capacity,
            "🚀 Engine started"
        );

        Ok(Self {
            config,
            orders_tx,
            dispatcher,
            connections: TaskTracker::new(),
            workers,
            shutdown,
            counters,
        })
    }

    /// Token that stops the engine when cancelled
    ///
    /// Cancelling it directly stops reads on every connection without
    /// waiting for the drain; call [`Engine::shutdown`] to wait.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    /// Serve one client stream until it ends or shutdown fires
    ///
    /// The returned handle completes when the connection loop exits.
    pub fn accept<S>(&self, stream: S) -> JoinHandle<()>
    where
        S: AsyncRead + Unpin + Send + 'static,
    {
        let id = EngineCounters::incr(&self.counters.connections_accepted) + 1;
        let connection = Connection::new(
            stream,
            self.orders_tx.clone(),
            self.config.ack_mode,
            self.shutdown.child_token(),
            Arc::clone(&self.counters),
        );

        let span = tracing::info_span!("connection", id);
        self.connections.spawn(
            async move {
                tracing::debug!("Connection accepted");
                match connection.run().await {
                    Ok(()) => tracing::debug!("Connection closed by peer"),
                    Err(e) if e.is_shutdown() => tracing::debug!("Connection closed: {}", e),
                    Err(e) if e.is_transport_error() => tracing::warn!("Connection failed: {}", e),
                    Err(e) => tracing::error!("Connection aborted: {}", e),
                }
            }
            .instrument(span),
        )
    }

    /// Stop reading, drain every queue and wait for all tasks to exit
    ///
    /// Gives up after the configured shutdown timeout and reports whatever
    /// is still alive.
    pub async fn shutdown(self) -> ShutdownReport {
        let Engine {
            config,
            orders_tx,
            mut dispatcher,
            connections,
            workers,
            shutdown,
            counters,
        } = self;

        tracing::info!("🛑 Shutting down engine");
        shutdown.cancel();
        connections.close();

        let drained = tokio::time::timeout(config.shutdown_timeout(), async {
            connections.wait().await;
            drop(orders_tx);
            (&mut dispatcher).await
        })
        .await;

        let report = match drained {
            Ok(Ok(summary)) => ShutdownReport {
                clean: true,
                connections_alive: 0,
                dispatcher_alive: false,
                workers_alive: 0,
                instruments: summary.instruments,
                stats: counters.snapshot(),
            },
            Ok(Err(e)) => {
                tracing::error!("Dispatcher task failed: {}", e);
                ShutdownReport {
                    clean: false,
                    connections_alive: connections.len(),
                    dispatcher_alive: false,
                    workers_alive: workers.len(),
                    instruments: 0,
                    stats: counters.snapshot(),
                }
            }
            Err(_) => ShutdownReport {
                clean: false,
                connections_alive: connections.len(),
                dispatcher_alive: !dispatcher.is_finished(),
                workers_alive: workers.len(),
                instruments: 0,
                stats: counters.snapshot(),
            },
        };

        if report.has_leaks() {
            tracing::error!(
                connections = report.connections_alive,
                dispatcher = report.dispatcher_alive,
                workers = report.workers_alive,
                "Shutdown timed out with tasks still running"
            );
        } else {
            tracing::info!(instruments = report.instruments, "🛑 Engine stopped cleanly");
        }

        report
    }
}
