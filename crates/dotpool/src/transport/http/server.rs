//! Listener setup and graceful shutdown for the HTTP transport.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{error, info};

use crate::service::MultiplyService;

use super::routes::routes;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// If true, ignore SIGTERM and wait for explicit /shutdown or SIGINT.
    pub await_explicit_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            await_explicit_shutdown: false,
        }
    }
}

/// What ended the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Requested,
}

impl ShutdownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::Requested => "POST /shutdown",
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bind `config.host:config.port` and serve until a shutdown source fires.
pub async fn serve(config: ServerConfig, service: Arc<MultiplyService>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "dotpool listening");

    let (reason_tx, reason_rx) = oneshot::channel();
    let stop = wait_for_shutdown(config.await_explicit_shutdown, service.shutdown_rx());

    axum::serve(listener, routes(Arc::clone(&service)))
        .with_graceful_shutdown(async move {
            let reason = stop.await;
            info!(%reason, "Draining connections");
            let _ = reason_tx.send(reason);
        })
        .await?;

    let stats = service.pool().await.stats();
    let reason = reason_rx.await.map(ShutdownReason::as_str).unwrap_or("unknown");
    info!(
        reason,
        completed = stats.completed,
        collisions = stats.collisions,
        in_use = stats.in_use,
        "dotpool stopped"
    );

    Ok(())
}

/// Resolve with the first shutdown source to fire.
///
/// SIGTERM is not watched when `await_explicit_shutdown` is set. A signal
/// whose handler cannot be installed is logged and never fires.
async fn wait_for_shutdown(
    await_explicit_shutdown: bool,
    mut shutdown_rx: watch::Receiver<bool>,
) -> ShutdownReason {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        if await_explicit_shutdown {
            info!("SIGTERM ignored until /shutdown or SIGINT");
            return std::future::pending::<()>().await;
        }
        terminate_signal().await
    };

    // A dropped sender means the service is gone and can no longer ask.
    let requested = async {
        if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => ShutdownReason::Interrupt,
        _ = terminate => ShutdownReason::Terminate,
        _ = requested => ShutdownReason::Requested,
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await
}
