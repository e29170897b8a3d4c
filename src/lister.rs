use anyhow::Result;
use tracing::{debug, info, warn};

use crate::stage::{SendResult, Stage};
use crate::types::error::is_credential_error;

/// Pages through every object version and delete marker of the bucket and
/// feeds them to the delete workers.
///
/// The lister owns the only sender of the work channel. Dropping it when
/// `list` returns closes the channel, which is how the workers learn that
/// no more work is coming.
pub struct VersionLister {
    stage: Stage,
}

impl VersionLister {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    /// List until the listing is exhausted, a listing call fails, every
    /// worker has gone away, or the drain is cancelled.
    ///
    /// Listing failures are logged and end the listing; only credential
    /// failures are returned.
    pub async fn list(self) -> Result<()> {
        debug!(bucket = self.stage.bucket(), "version lister has started.");

        let bucket = self.stage.bucket().to_string();
        let max_keys = self.stage.config.max_keys;
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            if self.stage.cancellation_token.is_cancelled() {
                info!(bucket = bucket, "version lister has been cancelled.");
                break;
            }

            let page = match self
                .stage
                .target
                .list_object_versions(
                    &bucket,
                    key_marker.as_deref(),
                    version_id_marker.as_deref(),
                    max_keys,
                )
                .await
            {
                Ok(page) => page,
                Err(e) if is_credential_error(&e) => return Err(e),
                Err(e) => {
                    warn!(
                        bucket = bucket,
                        key_marker = key_marker,
                        error = format!("{e:#}"),
                        "listing object versions failed, stop listing."
                    );
                    self.stage.set_warning();
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            self.stage
                .stats
                .record_listed((page.versions.len() + page.delete_markers.len()) as u64);

            let objects = page.versions.into_iter().chain(page.delete_markers);
            for object in objects {
                if self.stage.send(object).await? == SendResult::Closed {
                    debug!(bucket = bucket, "work channel has been closed.");
                    return Ok(());
                }
            }

            if !page.is_truncated {
                break;
            }
            if page.next_key_marker.is_none() && page.next_version_id_marker.is_none() {
                break;
            }
            key_marker = page.next_key_marker;
            version_id_marker = page.next_version_id_marker;
        }

        debug!(bucket = bucket, "version lister has been completed.");
        Ok(())
    }
}
