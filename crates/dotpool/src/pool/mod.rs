//! Bounded pool of dot-product workers.
//!
//! The pool's idle workers sit in a bounded channel that doubles as the
//! admission gate: `acquire` pops a worker or suspends until one is
//! returned, so granting capacity and assigning a worker are one step.
//!
//! - `WorkerPool::acquire` → `WorkerLease` (worker is out of the pool)
//! - `WorkerLease::release` or drop → worker returns to the pool that issued it
//! - `WorkerPool::resize` → a fresh pool; outstanding leases keep their old pool

mod lease;
mod worker_pool;

pub use lease::WorkerLease;
pub use worker_pool::{PoolError, PoolStats, WorkerPool};
