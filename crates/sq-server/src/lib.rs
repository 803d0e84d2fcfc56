//! sq-server: HTTP API, progress channel and conversion orchestration.
//!
//! This crate wires the codecs from `sq-codec` to the shared state from
//! `sq-core` and exposes them over HTTP. It provides:
//!
//! - Axum-based API for upload, conversion and one-shot downloads
//! - WebSocket progress channel fed by the process-wide broadcaster
//! - Background sweep of expired artifacts
//! - Graceful shutdown via signal handling

pub mod context;
pub mod conversion;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::time::Duration;

use sq_core::artifacts::start_sweep_task;
use sq_core::config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use crate::context::AppContext;

/// Start the squash server.
///
/// Binds the configured address and serves until a shutdown signal arrives.
pub async fn start(config: Config) -> sq_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| sq_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| sq_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    serve(listener, config, CancellationToken::new()).await
}

/// Serve on an already-bound listener until `cancel` fires or a shutdown
/// signal is received.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    cancel: CancellationToken,
) -> sq_core::Result<()> {
    let static_dir = config.server.static_dir.clone();
    let sweep_interval = config.artifacts.sweep_interval_secs;
    let ctx = AppContext::new(config);

    let sweep_handle = (sweep_interval > 0).then(|| {
        start_sweep_task(
            ctx.store.clone(),
            Duration::from_secs(sweep_interval),
            cancel.clone(),
        )
    });

    let app = router::build_router(ctx, static_dir);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Starting server on {addr}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // Stop background tasks.
    cancel.cancel();
    if let Some(handle) = sweep_handle {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
