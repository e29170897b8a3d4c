// Periodic throughput logging for a running drain.
//
// Samples the shared counters once per second and logs the running total,
// a moving average of ops/sec and a milestone line every 10000 ops.

use std::time::Duration;

use indicatif::{HumanCount, HumanDuration};
use simple_moving_average::{SMA, SumTreeSMA};
use tracing::info;

use crate::types::token::PipelineCancellationToken;
use crate::types::{DrainStats, SharedDrainStats};

/// Moving average window in seconds (samples).
const MOVING_AVERAGE_PERIOD_SECS: usize = 10;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// A milestone line is logged each time this many more ops have completed.
pub const MILESTONE_OPS: u64 = 10000;

/// What one tick of the reporter observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub ops: u64,
    /// Average since the drain started.
    pub ops_per_sec: u64,
    /// Set when `ops` crossed a multiple of [`MILESTONE_OPS`] since the
    /// previous tick.
    pub milestone: Option<u64>,
}

/// Compute a tick from the current op count, the drain's elapsed time and
/// the op count seen on the previous tick.
pub fn sample(ops: u64, elapsed: Duration, previous_ops: u64) -> ProgressSample {
    let elapsed_secs = elapsed.as_secs_f64();
    let ops_per_sec = if elapsed_secs < 1.0 {
        ops
    } else {
        (ops as f64 / elapsed_secs) as u64
    };

    let milestone = (ops / MILESTONE_OPS > previous_ops / MILESTONE_OPS)
        .then_some(ops / MILESTONE_OPS * MILESTONE_OPS);

    ProgressSample {
        ops,
        ops_per_sec,
        milestone,
    }
}

/// Logs the throughput of one drain until its token is cancelled.
pub struct ProgressReporter {
    bucket: String,
    stats: SharedDrainStats,
    cancellation_token: PipelineCancellationToken,
}

impl ProgressReporter {
    pub fn new(
        bucket: impl Into<String>,
        stats: SharedDrainStats,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            stats,
            cancellation_token,
        }
    }

    pub async fn report(self) {
        let mut interval = tokio::time::interval(REPORT_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;

        let mut ma_deleted_ops = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut previous_ops = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {},
                _ = self.cancellation_token.cancelled() => break,
            }

            let stats = self.stats.snapshot();
            let progress = sample(stats.deleted_ops, stats.elapsed, previous_ops);
            ma_deleted_ops.add_sample(progress.ops.saturating_sub(previous_ops));

            info!(
                bucket = self.bucket,
                deleted_ops = progress.ops,
                ops_per_sec = progress.ops_per_sec,
                "deleted {:>3} ops | {:>3} ops/sec",
                HumanCount(progress.ops),
                HumanCount(ma_deleted_ops.get_average()),
            );

            if let Some(milestone) = progress.milestone {
                info!(
                    bucket = self.bucket,
                    milestone = milestone,
                    "{} delete operations completed.",
                    HumanCount(milestone),
                );
            }

            previous_ops = progress.ops;
        }
    }
}

/// Log the final counters of a drain.
pub fn log_summary(bucket: &str, stats: &DrainStats) {
    info!(
        message = "drain summary",
        bucket = bucket,
        deleted_ops = stats.deleted_ops,
        deleted_objects = stats.deleted_objects,
        failed_objects = stats.failed_objects,
        listed_objects = stats.listed_objects,
        aborted_uploads = stats.aborted_uploads,
        duration_sec = stats.elapsed.as_secs_f64(),
    );
    info!(
        "{}: deleted {} objects in {} ops, {} failed, {} uploads aborted, duration {}",
        bucket,
        HumanCount(stats.deleted_objects),
        HumanCount(stats.deleted_ops),
        stats.failed_objects,
        stats.aborted_uploads,
        HumanDuration(stats.elapsed),
    );
}
