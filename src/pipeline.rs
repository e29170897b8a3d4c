//! Bucket drain orchestrator.
//!
//! Creates and connects the tasks of one drain:
//!
//! ```text
//! VersionLister → bounded channel → DeleteWorker × worker_size
//! MultipartAborter (independent)
//! ProgressReporter (not part of the completion barrier)
//! ```
//!
//! The drain returns once the lister has closed the channel, every worker
//! has observed the close and exited, and the aborter has finished. Only
//! then is the optional DeleteBucket issued.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::aborter::MultipartAborter;
use crate::config::DrainConfig;
use crate::deleter::DeleteWorker;
use crate::lister::VersionLister;
use crate::reporter::{self, ProgressReporter};
use crate::stage::Stage;
use crate::storage::Storage;
use crate::types::error::RgwboxError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{DrainStats, DrainStatsReport, ObjectIdentifier, SharedDrainStats};

/// Lifecycle of one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    /// Lister, aborter, workers and reporter are running.
    Draining,
    /// Every task of the barrier has exited; DeleteBucket may be pending.
    Finalizing,
    Done,
}

/// Empties one bucket of every object version, delete marker and
/// in-progress multipart upload, then optionally deletes the bucket.
///
/// Listing, abort and delete failures are logged and counted rather than
/// returned (see [`has_warning`](Self::has_warning)). `run` returns an error
/// only for invalid configuration, credential failures, cancellation, a
/// panicked task, or a failed final DeleteBucket.
///
/// ## Usage
///
/// ```no_run
/// # async fn example(target: rgwbox_rs::storage::Storage) -> anyhow::Result<()> {
/// use rgwbox_rs::{DrainConfig, DrainPipeline, create_pipeline_cancellation_token};
///
/// let config = DrainConfig::for_bucket("my-bucket");
/// let mut pipeline = DrainPipeline::new(config, target, create_pipeline_cancellation_token());
/// pipeline.run().await?;
/// println!("{:?}", pipeline.get_drain_stats());
/// # Ok(())
/// # }
/// ```
pub struct DrainPipeline {
    config: DrainConfig,
    target: Storage,
    /// Caller's token. Cancelling it stops the drain.
    cancellation_token: PipelineCancellationToken,
    /// Child of `cancellation_token`, also cancelled when a task fails fatally.
    drain_token: PipelineCancellationToken,
    state: DrainState,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    drain_stats_report: SharedDrainStats,
}

impl DrainPipeline {
    pub fn new(
        config: DrainConfig,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        let drain_token = cancellation_token.child_token();

        Self {
            config,
            target,
            cancellation_token,
            drain_token,
            state: DrainState::Idle,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            has_warning: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            drain_stats_report: Arc::new(DrainStatsReport::new()),
        }
    }

    /// Run the drain to completion.
    ///
    /// 1. Validate the configuration
    /// 2. Start the lister, the aborter, the workers and the reporter
    /// 3. Wait for the lister, the aborter and every worker
    /// 4. Stop the reporter and log the summary
    /// 5. Return the first fatal error, or issue DeleteBucket
    pub async fn run(&mut self) -> Result<()> {
        if self.state != DrainState::Idle {
            return Err(anyhow!(RgwboxError::InvalidArgument(
                "DrainPipeline::run() called more than once".to_string()
            )));
        }
        self.config.validate()?;

        self.state = DrainState::Draining;
        info!(
            bucket = self.config.bucket,
            worker_size = self.config.worker_size,
            queue_size = self.config.queue_size,
            batch_size = self.config.batch_size,
            "drain started."
        );

        let reporter_token = self.drain_token.child_token();
        let reporter_handle = self.report_progress(reporter_token.clone());

        let (sender, receiver) =
            async_channel::bounded::<ObjectIdentifier>(self.config.queue_size as usize);
        let mut handles = vec![self.list_versions(sender), self.abort_uploads()];
        handles.extend(self.delete_objects(receiver));

        for handle in handles {
            if let Err(e) = handle.await {
                self.record_panic(anyhow!("drain task panicked: {}", e));
            }
        }

        self.state = DrainState::Finalizing;
        reporter_token.cancel();
        if let Some(handle) = reporter_handle {
            if let Err(e) = handle.await {
                self.record_panic(anyhow!("progress reporter panicked: {}", e));
            }
        }
        reporter::log_summary(&self.config.bucket, &self.get_drain_stats());

        let result = self.finalize().await;
        self.state = DrainState::Done;

        result
    }

    async fn finalize(&self) -> Result<()> {
        let first_error = self.errors.lock().unwrap().pop_front();
        if let Some(e) = first_error {
            return Err(e);
        }

        if self.cancellation_token.is_cancelled() {
            info!(bucket = self.config.bucket, "drain has been cancelled.");
            return Err(anyhow!(RgwboxError::Cancelled));
        }

        if self.config.delete_bucket_after {
            let bucket = &self.config.bucket;
            self.target
                .delete_bucket(bucket)
                .await
                .with_context(|| format!("DeleteBucket failed for {bucket}"))?;
            info!(bucket = bucket, "bucket deleted.");
        }

        Ok(())
    }

    pub fn state(&self) -> DrainState {
        self.state
    }

    /// Check if a task of the drain failed fatally.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Check if any spawned task panicked during the drain.
    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// Check if a listing, abort or delete failure was logged and skipped.
    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    pub fn get_drain_stats(&self) -> DrainStats {
        self.drain_stats_report.snapshot()
    }

    fn record_panic(&self, error: anyhow::Error) {
        error!("{}", error);
        self.has_panic.store(true, Ordering::SeqCst);
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }

    fn create_stage(
        &self,
        receiver: Option<Receiver<ObjectIdentifier>>,
        sender: Option<Sender<ObjectIdentifier>>,
    ) -> Stage {
        Stage::new(
            self.config.clone(),
            self.target.clone(),
            receiver,
            sender,
            self.drain_token.clone(),
            self.drain_stats_report.clone(),
            self.has_warning.clone(),
        )
    }

    /// Uses the double-spawn pattern to catch panics. A failed or panicked
    /// task cancels the rest of the drain.
    fn spawn_task<F>(&self, name: String, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let has_error = self.has_error.clone();
        let has_panic = self.has_panic.clone();
        let error_list = self.errors.clone();
        let drain_token = self.drain_token.clone();

        tokio::spawn(async move {
            let join_result = tokio::spawn(task).await;

            match join_result {
                Ok(Ok(())) => {
                    debug!(task = name, "drain task completed successfully.");
                }
                Ok(Err(e)) => {
                    drain_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    error!(task = name, "drain task failed: {:#}", e);
                    error_list.lock().unwrap().push_back(e);
                }
                Err(e) => {
                    drain_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    has_panic.store(true, Ordering::SeqCst);
                    error!(task = name, "drain task panicked: {}", e);
                    error_list
                        .lock()
                        .unwrap()
                        .push_back(anyhow!("{} panicked: {}", name, e));
                }
            }
        })
    }

    /// The lister owns the only sender; the channel closes when it returns.
    fn list_versions(&self, sender: Sender<ObjectIdentifier>) -> JoinHandle<()> {
        let lister = VersionLister::new(self.create_stage(None, Some(sender)));
        self.spawn_task("version lister".to_string(), lister.list())
    }

    fn abort_uploads(&self) -> JoinHandle<()> {
        let aborter = MultipartAborter::new(self.create_stage(None, None));
        self.spawn_task("multipart aborter".to_string(), aborter.abort_all())
    }

    /// Spawn `worker_size` workers sharing the receiving end of the channel.
    fn delete_objects(&self, receiver: Receiver<ObjectIdentifier>) -> Vec<JoinHandle<()>> {
        (0..self.config.worker_size)
            .map(|worker_index| {
                let stage = self.create_stage(Some(receiver.clone()), None);
                let mut worker = DeleteWorker::new(stage, worker_index);
                self.spawn_task(format!("delete worker {worker_index}"), async move {
                    worker.delete().await
                })
            })
            .collect()
    }

    fn report_progress(&self, token: PipelineCancellationToken) -> Option<JoinHandle<()>> {
        if self.config.show_no_progress {
            return None;
        }

        let reporter = ProgressReporter::new(
            self.config.bucket.clone(),
            self.drain_stats_report.clone(),
            token,
        );
        Some(tokio::spawn(reporter.report()))
    }
}

/// Drain `bucket` with the given settings and optionally delete it.
pub async fn empty_bucket(
    target: Storage,
    bucket: &str,
    worker_size: u16,
    queue_size: u32,
    batch_size: u16,
    delete_bucket_after: bool,
    cancellation_token: PipelineCancellationToken,
) -> Result<()> {
    let config = DrainConfig {
        worker_size,
        queue_size,
        batch_size,
        delete_bucket_after,
        ..DrainConfig::for_bucket(bucket)
    };

    DrainPipeline::new(config, target, cancellation_token)
        .run()
        .await
}
