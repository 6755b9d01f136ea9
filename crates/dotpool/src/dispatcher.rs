//! Dispatcher: fans a matrix product out to the worker pool, one task per cell.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::matrix::Matrix;
use crate::pool::{PoolError, WorkerPool};
use crate::worker::ComputeError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Cell ({row}, {col}) failed: {source}")]
    Cell {
        row: usize,
        col: usize,
        #[source]
        source: ComputeError,
    },

    #[error("Multiplication did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Cell task failed: {0}")]
    Task(String),
}

/// Splits a product into per-cell dot products and runs each on a pooled worker.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the whole multiplication. Cells still running when the deadline
    /// passes are aborted and their workers go back to the pool.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Multiply `left × right` using workers from `pool`.
    ///
    /// Shapes must already have been checked with [`Matrix::check_product`].
    /// Either every cell is computed or an error is returned; a partially
    /// filled matrix is never handed back.
    pub async fn multiply(
        &self,
        left: &Matrix,
        right: &Matrix,
        pool: Arc<WorkerPool>,
    ) -> Result<Matrix, DispatchError> {
        debug_assert!(left.check_product(right).is_ok());

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, dispatch(left, right, pool))
                .await
                .map_err(|_| DispatchError::Timeout(limit))?,
            None => dispatch(left, right, pool).await,
        }
    }
}

async fn dispatch(
    left: &Matrix,
    right: &Matrix,
    pool: Arc<WorkerPool>,
) -> Result<Matrix, DispatchError> {
    let (rows, cols) = (left.rows(), right.cols());
    let mut result = Matrix::zeros(rows, cols);
    if rows == 0 || cols == 0 {
        return Ok(result);
    }

    let left_rows: Arc<[Vec<i64>]> = left.as_rows().into();
    let right_cols: Arc<[Vec<i64>]> = (0..cols)
        .map(|j| right.column(j).unwrap_or_default())
        .collect();

    let mut cells = JoinSet::new();
    for i in 0..rows {
        for j in 0..cols {
            let pool = Arc::clone(&pool);
            let left_rows = Arc::clone(&left_rows);
            let right_cols = Arc::clone(&right_cols);

            cells.spawn(async move {
                let lease = pool.acquire().await?;
                let value = lease.compute(&left_rows[i], &right_cols[j]);
                lease.release();

                let value = value.map_err(|source| DispatchError::Cell {
                    row: i,
                    col: j,
                    source,
                })?;
                Ok::<_, DispatchError>((i, j, value))
            });
        }
    }

    // Returning early drops the JoinSet, which aborts the remaining cells.
    while let Some(joined) = cells.join_next().await {
        let (i, j, value) = joined.map_err(|e| DispatchError::Task(e.to_string()))??;
        result.set(i, j, value);
    }

    tracing::debug!(rows, cols, cells = rows * cols, "Multiplication dispatched");
    Ok(result)
}
