//! WorkerLease - exclusive hold on one pooled worker.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;

use super::worker_pool::PoolCounters;
use crate::worker::{ComputeError, Worker, WorkerId};

struct PoolConnection {
    pool_tx: mpsc::Sender<Worker>,
    counters: Arc<PoolCounters>,
}

/// A worker taken out of its pool.
///
/// The worker goes back to the pool that issued the lease exactly once: on
/// `release`, or on drop if the lease was never released explicitly. If that
/// pool has been dropped in the meantime the worker is discarded.
#[must_use = "dropping a lease immediately returns the worker to the pool"]
pub struct WorkerLease {
    worker_id: WorkerId,
    worker: Option<Worker>,
    pool: PoolConnection,
}

impl WorkerLease {
    pub(crate) fn new(
        worker: Worker,
        pool_tx: mpsc::Sender<Worker>,
        counters: Arc<PoolCounters>,
    ) -> Self {
        let in_use = counters.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        counters.peak_in_use.fetch_max(in_use, Ordering::AcqRel);

        Self {
            worker_id: worker.id(),
            worker: Some(worker),
            pool: PoolConnection { pool_tx, counters },
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Run one dot product on the leased worker.
    pub fn compute(&self, row: &[i64], col: &[i64]) -> Result<i64, ComputeError> {
        let worker = self
            .worker
            .as_ref()
            .ok_or(ComputeError::Released(self.worker_id))?;

        let result = worker.compute(row, col);
        match &result {
            Err(ComputeError::AlreadyBusy(_)) => {
                self.pool.counters.collisions.fetch_add(1, Ordering::AcqRel);
            }
            _ => {
                self.pool.counters.completed.fetch_add(1, Ordering::AcqRel);
            }
        }
        result
    }

    pub(crate) fn belongs_to(&self, counters: &Arc<PoolCounters>) -> bool {
        Arc::ptr_eq(&self.pool.counters, counters)
    }

    /// Return the worker to its pool.
    pub fn release(mut self) {
        self.return_to_pool();
    }

    fn return_to_pool(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if worker.is_busy() {
            tracing::error!(worker = %self.worker_id, "Worker returned to pool while busy");
        }

        let counters = &self.pool.counters;
        counters.in_use.fetch_sub(1, Ordering::AcqRel);

        // Count before sending so a concurrent acquire never decrements below zero.
        counters.available.fetch_add(1, Ordering::AcqRel);
        if self.pool.pool_tx.try_send(worker).is_err() {
            counters.available.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!(worker = %self.worker_id, "Pool closed - discarding worker");
        }
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.return_to_pool();
    }
}

impl std::fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease")
            .field("worker_id", &self.worker_id)
            .field("released", &self.worker.is_none())
            .finish()
    }
}
