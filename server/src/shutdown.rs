//! Graceful shutdown.
//!
//! The sequence is: refuse new sessions, close every registered session,
//! then let the listener stop. [`serve`] takes the trigger as a plain future
//! so tests can drive it without OS signals.

use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::state::AppState;

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

/// Serve `app` until `signal` resolves, then drain and stop.
///
/// Every session is closed before the listener stops, so streaming clients
/// see their response end instead of a reset connection.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    state: AppState,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            let closed = state.drain().await;
            info!("Closed {} SSE session(s), stopping listener", closed);
        })
        .await
}
