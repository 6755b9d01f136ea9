//! dotpool: matrix multiplication over a bounded pool of dot-product workers.

mod health;
mod version;

pub mod dispatcher;
pub mod matrix;
pub mod pool;
pub mod service;
pub mod transport;
pub mod worker;

pub use dispatcher::{DispatchError, Dispatcher};
pub use health::Health;
pub use matrix::{Matrix, MatrixError, Operand};
pub use pool::{PoolError, PoolStats, WorkerLease, WorkerPool};
pub use service::{
    DEFAULT_MAX_WORKERS, DEFAULT_WORKERS, HealthSnapshot, MultiplyError, MultiplyService,
    ServiceConfig,
};
pub use version::{DOTPOOL_VERSION, VersionInfo};
pub use worker::{ComputeError, Worker, WorkerId};
