//! Throughput and completion-time estimation for batch progress logs.
//!
//! The estimate is a plain linear extrapolation from elapsed time and
//! remaining count. It is diagnostic output, not a contract; swapping in a
//! different estimator changes nothing about job correctness.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Point-in-time view of backfill progress.
#[derive(Clone, Copy, Debug)]
pub struct ProgressSnapshot {
    /// Runs processed so far.
    pub processed: u64,
    /// Runs in the whole job.
    pub total: u64,
    /// Observed throughput in runs per second.
    pub per_sec: f64,
    /// Estimated completion time; `None` before any throughput is observed.
    pub eta: Option<DateTime<Utc>>,
}

/// Tracks a job's wall-clock progress.
#[derive(Clone, Copy, Debug)]
pub struct ProgressEstimator {
    started: Instant,
    total: u64,
}

impl ProgressEstimator {
    /// Start the clock for a job over `total` runs.
    #[must_use]
    pub fn start(total: u64) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    /// Wall-clock time since [`start`](Self::start).
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Snapshot after `processed` runs.
    #[must_use]
    pub fn snapshot(&self, processed: u64) -> ProgressSnapshot {
        let elapsed = self.elapsed().as_secs_f64();
        let per_sec = if elapsed > 0.0 {
            processed as f64 / elapsed
        } else {
            0.0
        };
        let eta = (per_sec > 0.0).then(|| {
            let remaining = self.total.saturating_sub(processed) as f64 / per_sec;
            Utc::now() + chrono::Duration::milliseconds((remaining * 1000.0) as i64)
        });
        ProgressSnapshot {
            processed,
            total: self.total,
            per_sec,
            eta,
        }
    }
}
