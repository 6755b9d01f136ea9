//! Worker - computes one dot product per assignment.
//!
//! A worker is owned by exactly one `WorkerPool` and only reachable through a
//! `WorkerLease`. The busy flag is set for the duration of `compute` and is
//! cleared by a guard, so every exit path leaves the worker idle.

use std::sync::atomic::{AtomicBool, Ordering};

/// Identifier of a worker, unique across pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(uuid::Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("Operand lengths differ: row has {row} elements, column has {col}")]
    LengthMismatch { row: usize, col: usize },
    #[error("Dot product overflowed a 64-bit integer")]
    Overflow,
    #[error("Worker {0} assigned while already busy")]
    AlreadyBusy(WorkerId),
    #[error("Lease for worker {0} already released")]
    Released(WorkerId),
}

/// Clears the busy flag on drop.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    busy: AtomicBool,
}

impl Worker {
    pub(crate) fn new() -> Self {
        Self {
            id: WorkerId::new(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Compute `Σ row[i] * col[i]`.
    pub fn compute(&self, row: &[i64], col: &[i64]) -> Result<i64, ComputeError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::error!(worker = %self.id, "Worker assigned while already busy");
            return Err(ComputeError::AlreadyBusy(self.id));
        }
        let _busy = BusyGuard(&self.busy);

        if row.len() != col.len() {
            return Err(ComputeError::LengthMismatch {
                row: row.len(),
                col: col.len(),
            });
        }

        row.iter().zip(col).try_fold(0i64, |acc, (&a, &b)| {
            a.checked_mul(b)
                .and_then(|product| acc.checked_add(product))
                .ok_or(ComputeError::Overflow)
        })
    }
}
