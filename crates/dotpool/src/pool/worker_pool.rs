//! Worker pool with a channel-backed admission gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use super::WorkerLease;
use crate::worker::Worker;

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub available: AtomicUsize,
    pub in_use: AtomicUsize,
    pub peak_in_use: AtomicUsize,
    pub completed: AtomicU64,
    pub collisions: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Zero-capacity pools can never grant a worker; acquiring fails fast
    /// instead of suspending forever.
    #[error("Worker pool has zero capacity")]
    Exhausted,
    #[error("Worker pool closed")]
    Closed,
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub in_use: usize,
    /// Highest number of simultaneously held leases since creation.
    pub peak_in_use: usize,
    /// Computations run on this pool's workers.
    pub completed: u64,
    /// Times a worker was handed out while already busy. Always 0 unless
    /// the pool is broken.
    pub collisions: u64,
}

/// Fixed-capacity pool of dot-product workers.
pub struct WorkerPool {
    available_rx: Mutex<mpsc::Receiver<Worker>>,
    available_tx: mpsc::Sender<Worker>,
    capacity: usize,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        // mpsc needs a non-zero bound; a zero-capacity pool simply never holds a worker.
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let pool = Self {
            available_rx: Mutex::new(rx),
            available_tx: tx,
            capacity,
            counters: Arc::new(PoolCounters::default()),
        };

        for _ in 0..capacity {
            let worker = Worker::new();
            let worker_id = worker.id();
            pool.counters.available.fetch_add(1, Ordering::AcqRel);
            if let Err(e) = pool.available_tx.try_send(worker) {
                pool.counters.available.fetch_sub(1, Ordering::AcqRel);
                tracing::error!(worker = %worker_id, error = %e, "Failed to add worker to pool");
            }
        }

        if capacity == 0 {
            tracing::warn!("Worker pool created with zero capacity - every acquire will fail");
        } else {
            tracing::debug!(capacity, "Worker pool created");
        }

        pool
    }

    /// Wait for an idle worker.
    ///
    /// Suspends without polling until a lease is released. Waiters are served
    /// in the order they reached the receiver lock.
    pub async fn acquire(&self) -> Result<WorkerLease, PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::Exhausted);
        }

        let mut rx = self.available_rx.lock().await;
        let worker = rx.recv().await.ok_or(PoolError::Closed)?;
        self.counters.available.fetch_sub(1, Ordering::AcqRel);

        Ok(self.lease(worker))
    }

    /// Take an idle worker if one is free right now.
    pub fn try_acquire(&self) -> Option<WorkerLease> {
        let mut rx = self.available_rx.try_lock().ok()?;
        let worker = rx.try_recv().ok()?;
        self.counters.available.fetch_sub(1, Ordering::AcqRel);

        Some(self.lease(worker))
    }

    fn lease(&self, worker: Worker) -> WorkerLease {
        WorkerLease::new(
            worker,
            self.available_tx.clone(),
            Arc::clone(&self.counters),
        )
    }

    /// Return a leased worker. Leases always go back to the pool that issued them.
    pub fn release(&self, lease: WorkerLease) {
        if !lease.belongs_to(&self.counters) {
            tracing::warn!(
                worker = %lease.worker_id(),
                "Lease released through a different pool - returning it to its own pool"
            );
        }
        lease.release();
    }

    /// Build a replacement pool with `capacity` fresh workers.
    ///
    /// `self` is left untouched: leases already handed out keep working
    /// against this pool until they are released.
    pub fn resize(&self, capacity: usize) -> WorkerPool {
        tracing::info!(
            from = self.capacity,
            to = capacity,
            in_flight = self.in_use(),
            "Resizing worker pool"
        );
        WorkerPool::new(capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.counters.available.load(Ordering::Acquire)
    }

    pub fn in_use(&self) -> usize {
        self.counters.in_use.load(Ordering::Acquire)
    }

    pub fn is_degenerate(&self) -> bool {
        self.capacity == 0
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            available: self.available(),
            in_use: self.in_use(),
            peak_in_use: self.counters.peak_in_use.load(Ordering::Acquire),
            completed: self.counters.completed.load(Ordering::Acquire),
            collisions: self.counters.collisions.load(Ordering::Acquire),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("in_use", &self.in_use())
            .finish()
    }
}
