//! Delete workers of the drain pipeline.
//!
//! This module contains the DeleteWorker and the Deleter trait with its two
//! implementations: BatchDeleter (DeleteObjects) and SingleDeleter
//! (DeleteObject).

use anyhow::{Result, anyhow};
use async_channel::{Receiver, TryRecvError};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::stage::Stage;
use crate::types::error::is_credential_error;
use crate::types::{DeleteError, ObjectIdentifier};

pub mod batch;
pub mod single;

pub use batch::BatchDeleter;
pub use single::SingleDeleter;


// ---------------------------------------------------------------------------
// Deleter trait
// ---------------------------------------------------------------------------

/// Outcome of one delete request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted: Vec<ObjectIdentifier>,
    /// Per-key failures reported inside a successful response.
    pub failed: Vec<DeleteError>,
}

/// Deletion backend used by a worker.
///
/// `Err` means the request itself failed; per-key failures of a batched
/// request are returned in [`DeleteResult::failed`].
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(&self, bucket: &str, objects: &[ObjectIdentifier]) -> Result<DeleteResult>;
}

// ---------------------------------------------------------------------------
// DeleteWorker
// ---------------------------------------------------------------------------

/// Pipeline worker that reads identifiers from the work channel and deletes
/// them, one request per identifier or one request per batch.
pub struct DeleteWorker {
    worker_index: u16,
    stage: Stage,
    deleter: Box<dyn Deleter>,
    buffer: Vec<ObjectIdentifier>,
    /// `None` in per-object mode.
    batch_size: Option<usize>,
}

impl DeleteWorker {
    pub fn new(stage: Stage, worker_index: u16) -> Self {
        let target = stage.target.clone();
        let batch_size = stage.config.effective_batch_size();

        let deleter: Box<dyn Deleter> = match batch_size {
            Some(_) => Box::new(BatchDeleter::new(target)),
            None => Box::new(SingleDeleter::new(target)),
        };

        Self {
            worker_index,
            stage,
            deleter,
            buffer: Vec::with_capacity(batch_size.unwrap_or(1)),
            batch_size,
        }
    }

    /// Main entry point: receive identifiers until the channel is closed and
    /// empty, or the drain is cancelled.
    ///
    /// Delete failures are logged and counted. Only credential failures are
    /// returned.
    pub async fn delete(&mut self) -> Result<()> {
        debug!(worker_index = self.worker_index, "delete worker started.");

        let receiver = self
            .stage
            .receiver
            .clone()
            .ok_or_else(|| anyhow!("delete worker has no receiver"))?;

        match self.batch_size {
            Some(batch_size) => self.receive_and_delete_batched(&receiver, batch_size).await,
            None => self.receive_and_delete_each(&receiver).await,
        }
    }

    async fn receive_and_delete_each(
        &mut self,
        receiver: &Receiver<ObjectIdentifier>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(object) => {
                            self.buffer.push(object);
                            self.delete_buffered_objects().await?;
                        }
                        Err(_) => {
                            debug!(
                                worker_index = self.worker_index,
                                "delete worker has been completed."
                            );
                            return Ok(());
                        }
                    }
                },
                _ = self.stage.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "delete worker has been cancelled.");
                    return Ok(());
                }
            }
        }
    }

    async fn receive_and_delete_batched(
        &mut self,
        receiver: &Receiver<ObjectIdentifier>,
        batch_size: usize,
    ) -> Result<()> {
        loop {
            if self.stage.cancellation_token.is_cancelled() {
                info!(worker_index = self.worker_index, "delete worker has been cancelled.");
                return Ok(());
            }

            match receiver.try_recv() {
                Ok(object) => self.buffer_object(object, batch_size).await?,
                Err(TryRecvError::Empty) if !self.buffer.is_empty() => {
                    // Nothing queued right now: send the partial batch instead
                    // of holding it while the lister is slow.
                    self.delete_buffered_objects().await?;
                }
                Err(TryRecvError::Empty) => {
                    tokio::select! {
                        recv_result = receiver.recv() => {
                            match recv_result {
                                Ok(object) => self.buffer_object(object, batch_size).await?,
                                Err(_) => break,
                            }
                        },
                        _ = self.stage.cancellation_token.cancelled() => {
                            info!(
                                worker_index = self.worker_index,
                                "delete worker has been cancelled."
                            );
                            return Ok(());
                        }
                    }
                }
                Err(TryRecvError::Closed) => break,
            }
        }

        self.delete_buffered_objects().await?;
        debug!(worker_index = self.worker_index, "delete worker has been completed.");

        Ok(())
    }

    async fn buffer_object(&mut self, object: ObjectIdentifier, batch_size: usize) -> Result<()> {
        self.buffer.push(object);
        if self.buffer.len() >= batch_size {
            self.delete_buffered_objects().await?;
        }
        Ok(())
    }

    async fn delete_buffered_objects(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.buffer);
        let requested = batch.len() as u64;

        match self.deleter.delete(self.stage.bucket(), &batch).await {
            Ok(result) => {
                self.stage
                    .stats
                    .record_delete_op(requested, result.failed.len() as u64);

                for failed in &result.failed {
                    warn!(
                        worker_index = self.worker_index,
                        key = failed.key,
                        version_id = failed.version_id,
                        code = failed.code,
                        message = failed.message,
                        "delete failed for key '{}'.",
                        failed.key,
                    );
                }
                if !result.failed.is_empty() {
                    self.stage.set_warning();
                }

                debug!(
                    worker_index = self.worker_index,
                    deleted = result.deleted.len(),
                    failed = result.failed.len(),
                    "delete request completed."
                );
            }
            Err(e) if is_credential_error(&e) => {
                self.stage.stats.record_failed_objects(requested);
                return Err(e);
            }
            Err(e) => {
                warn!(
                    worker_index = self.worker_index,
                    objects = requested,
                    first_key = batch[0].key,
                    error = format!("{e:#}"),
                    "delete request failed."
                );
                self.stage.stats.record_failed_objects(requested);
                self.stage.set_warning();
            }
        }

        Ok(())
    }
}
