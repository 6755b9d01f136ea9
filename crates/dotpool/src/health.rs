//! Health status reported by the service.

use serde::{Deserialize, Serialize};

use crate::pool::PoolStats;

/// Health status of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// At least one worker is idle
    Ready,
    /// Every worker is leased; new cells wait for a release
    Busy,
    /// Pool resized to zero capacity; multiplications fail
    Degenerate,
}

impl Health {
    pub fn from_stats(stats: &PoolStats) -> Self {
        if stats.capacity == 0 {
            Health::Degenerate
        } else if stats.available == 0 {
            Health::Busy
        } else {
            Health::Ready
        }
    }
}
