use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::config::DrainConfig;
use crate::storage::Storage;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ObjectIdentifier, SharedDrainStats};

/// Result of sending an identifier to the delete workers.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

/// Shared context handed to each task of a drain.
///
/// The lister owns the only `sender`; the delete workers each hold a clone
/// of the `receiver`. The aborter needs neither.
pub struct Stage {
    pub config: DrainConfig,
    pub target: Storage,
    pub receiver: Option<Receiver<ObjectIdentifier>>,
    pub sender: Option<Sender<ObjectIdentifier>>,
    pub cancellation_token: PipelineCancellationToken,
    pub stats: SharedDrainStats,
    pub has_warning: Arc<AtomicBool>,
}

impl Stage {
    pub fn new(
        config: DrainConfig,
        target: Storage,
        receiver: Option<Receiver<ObjectIdentifier>>,
        sender: Option<Sender<ObjectIdentifier>>,
        cancellation_token: PipelineCancellationToken,
        stats: SharedDrainStats,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            target,
            receiver,
            sender,
            cancellation_token,
            stats,
            has_warning,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Send an identifier to the delete workers.
    ///
    /// Returns `SendResult::Closed` if every receiver has gone away, so the
    /// caller can stop listing.
    pub async fn send(&self, object: ObjectIdentifier) -> Result<SendResult> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("stage has no sender"))?;

        let result = sender
            .send(object)
            .await
            .context("async_channel::Sender::send() failed.");

        if let Err(e) = result {
            return if !sender.is_closed() {
                Err(e)
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    /// Set the warning flag to indicate a swallowed failure.
    pub fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }
}
