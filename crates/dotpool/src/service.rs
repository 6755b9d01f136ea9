//! MultiplyService: transport-agnostic multiplication over a live worker pool.
//!
//! This service owns:
//! - The process-wide pool reference (created once, swapped on resize)
//! - The dispatcher and its deadline
//! - Shutdown coordination
//!
//! Transports (HTTP) validate nothing themselves beyond decoding; they hand
//! both operands to `multiply`, which checks shapes before any worker is used.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::health::Health;
use crate::matrix::{Matrix, MatrixError};
use crate::pool::{PoolStats, WorkerPool};
use crate::version::VersionInfo;

/// Pool capacity used when none is configured.
pub const DEFAULT_WORKERS: usize = 10;

/// Largest pool `/change` will build when no limit is configured.
pub const DEFAULT_MAX_WORKERS: usize = 4096;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Capacity of the pool created at startup.
    pub default_workers: usize,
    /// Deadline for a whole multiplication; `None` waits indefinitely.
    pub dispatch_timeout: Option<Duration>,
    /// Upper bound for externally requested resizes.
    pub max_workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_workers: DEFAULT_WORKERS,
            dispatch_timeout: None,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MultiplyError {
    #[error(transparent)]
    Invalid(#[from] MatrixError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Snapshot of service health for transports to query.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub state: Health,
    pub pool: PoolStats,
    pub version: VersionInfo,
}

pub struct MultiplyService {
    /// Live pool. Dispatches clone the `Arc` and keep it until they finish,
    /// so a resize never affects work already in flight.
    pool: RwLock<Arc<WorkerPool>>,
    dispatcher: Dispatcher,
    max_workers: usize,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    version: VersionInfo,
}

impl MultiplyService {
    pub fn new(config: ServiceConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut dispatcher = Dispatcher::new();
        if let Some(timeout) = config.dispatch_timeout {
            dispatcher = dispatcher.with_timeout(timeout);
        }

        tracing::info!(
            workers = config.default_workers,
            timeout = ?config.dispatch_timeout,
            max_workers = config.max_workers,
            "Creating worker pool"
        );

        Self {
            pool: RwLock::new(Arc::new(WorkerPool::new(config.default_workers))),
            dispatcher,
            max_workers: config.max_workers,
            shutdown_tx,
            shutdown_rx,
            version: VersionInfo::new(),
        }
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }

    /// Current pool.
    pub async fn pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&*self.pool.read().await)
    }

    /// Limit applied to resize requests coming from transports.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Replace the live pool with a fresh one of `capacity` workers.
    ///
    /// Multiplications already running keep the pool they started with and
    /// finish against its capacity.
    pub async fn resize_pool(&self, capacity: usize) -> Arc<WorkerPool> {
        let mut live = self.pool.write().await;
        let next = Arc::new(live.resize(capacity));
        *live = Arc::clone(&next);
        tracing::info!(workers = capacity, "Worker pool replaced");
        next
    }

    /// Multiply `left × right` on the live pool.
    pub async fn multiply(&self, left: Matrix, right: Matrix) -> Result<Matrix, MultiplyError> {
        left.check_product(&right)?;

        tracing::debug!(rows = left.rows(), cols = left.cols(), "Matrix A:\n{}", left);
        tracing::debug!(rows = right.rows(), cols = right.cols(), "Matrix B:\n{}", right);

        let pool = self.pool().await;
        let result = self.dispatcher.multiply(&left, &right, pool).await?;

        tracing::debug!(rows = result.rows(), cols = result.cols(), "Result:\n{}", result);
        Ok(result)
    }

    pub async fn health(&self) -> HealthSnapshot {
        let pool = self.pool().await.stats();
        HealthSnapshot {
            state: Health::from_stats(&pool),
            pool,
            version: self.version.clone(),
        }
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}

impl Default for MultiplyService {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}
