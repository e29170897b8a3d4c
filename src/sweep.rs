use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use tracing::{error, info};

use crate::config::DrainConfig;
use crate::pipeline::DrainPipeline;
use crate::storage::Storage;
use crate::types::error::{RgwboxError, is_cancelled_error, is_credential_error};
use crate::types::token::PipelineCancellationToken;

/// Drains every bucket of the caller whose name matches a substring.
///
/// Buckets are drained one after another with the settings of `template`;
/// only the bucket name changes. A failed drain is logged and the sweep
/// moves on to the next bucket. Failures a drain logged and skipped are
/// reported through [`has_warning`](Self::has_warning).
pub struct BucketSweeper {
    target: Storage,
    template: DrainConfig,
    cancellation_token: PipelineCancellationToken,
    has_warning: AtomicBool,
}

impl BucketSweeper {
    pub fn new(
        target: Storage,
        template: DrainConfig,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            target,
            template,
            cancellation_token,
            has_warning: AtomicBool::new(false),
        }
    }

    /// Check if any drain of the sweep logged and skipped a failure.
    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    /// Names of the caller's buckets containing `name_contains`. An empty
    /// substring matches every bucket.
    pub async fn matching_buckets(&self, name_contains: &str) -> Result<Vec<String>> {
        let buckets = self.target.list_buckets().await?;
        Ok(buckets
            .into_iter()
            .filter(|bucket| bucket.contains(name_contains))
            .collect())
    }

    /// Returns [`RgwboxError::SweepFailed`] naming every bucket whose drain
    /// failed. Credential failures and cancellation stop the sweep at once.
    pub async fn drain_all_buckets(&self, name_contains: &str) -> Result<()> {
        let buckets = self.matching_buckets(name_contains).await?;
        info!(
            name_contains = name_contains,
            buckets = buckets.len(),
            "bucket sweep started."
        );

        let mut failed = Vec::new();
        for bucket in buckets {
            if self.cancellation_token.is_cancelled() {
                info!("bucket sweep has been cancelled.");
                return Err(anyhow!(RgwboxError::Cancelled));
            }

            let config = DrainConfig {
                bucket: bucket.clone(),
                ..self.template.clone()
            };
            let mut pipeline =
                DrainPipeline::new(config, self.target.clone(), self.cancellation_token.clone());

            let result = pipeline.run().await;
            if pipeline.has_warning() {
                self.has_warning.store(true, Ordering::SeqCst);
            }

            match result {
                Ok(()) => info!(bucket = bucket, "bucket drained."),
                Err(e) if is_credential_error(&e) || is_cancelled_error(&e) => return Err(e),
                Err(e) => {
                    error!(bucket = bucket, error = format!("{e:#}"), "bucket drain failed.");
                    failed.push(bucket);
                }
            }
        }

        if !failed.is_empty() {
            return Err(anyhow!(RgwboxError::SweepFailed(failed)));
        }

        Ok(())
    }
}

/// Drain every bucket whose name contains `name_contains` with the default
/// drain settings, deleting each bucket afterwards.
pub async fn drain_all_buckets(
    target: Storage,
    name_contains: &str,
    cancellation_token: PipelineCancellationToken,
) -> Result<()> {
    BucketSweeper::new(target, DrainConfig::default(), cancellation_token)
        .drain_all_buckets(name_contains)
        .await
}
