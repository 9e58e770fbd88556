use matching_engine::{Engine, EngineConfig, StdoutSink};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Events go to stdout, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matching_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(report) if report.clean => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<matching_engine::ShutdownReport, Box<dyn std::error::Error>> {
    let mut config = EngineConfig::with_env_config()?;
    if let Some(path) = std::env::args_os().nth(1) {
        config = config.with_socket_path(path);
    }
    let socket_path = config
        .socket_path
        .clone()
        .ok_or("usage: matching-engine <socket path> (or set ENGINE_SOCKET_PATH)")?;

    remove_stale_socket(&socket_path)?;
    let listener = UnixListener::bind(&socket_path)?;
    tracing::info!("🚀 Listening on {}", socket_path.display());

    let sink = Arc::new(StdoutSink::new(config.output_format));
    let engine = Engine::start(config, sink)?;

    let token = engine.shutdown_token();
    tokio::spawn(forward_signals(token.clone()));

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    engine.accept(stream);
                }
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    break;
                }
            },
        }
    }

    // Stop accepting before draining
    drop(listener);
    let report = engine.shutdown().await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!("Failed to remove {}: {}", socket_path.display(), e);
    }

    tracing::info!(
        clean = report.clean,
        connections = report.stats.connections_accepted,
        orders = report.stats.orders_received,
        instruments = report.instruments,
        "Engine exited"
    );

    Ok(report)
}

/// Cancel `token` on ctrl-c or SIGTERM
async fn forward_signals(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            let _ = ctrl_c.await;
            token.cancel();
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate.recv() => {},
        _ = token.cancelled() => return,
    }

    tracing::info!("🛑 Shutdown signal received");
    token.cancel();
}

/// A socket file left by a previous run blocks `bind`
fn remove_stale_socket(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed stale socket {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
