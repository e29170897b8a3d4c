use anyhow::Result;
use tracing::{debug, info, warn};

use crate::stage::Stage;
use crate::types::error::is_credential_error;

/// Uploads requested per ListMultipartUploads page.
pub const MAX_UPLOADS: i32 = 1000;

/// Aborts every in-progress multipart upload of the bucket.
///
/// Runs alongside the version lister. Abort failures are logged and the
/// scan continues; a failed listing ends the scan.
pub struct MultipartAborter {
    stage: Stage,
}

impl MultipartAborter {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    pub async fn abort_all(self) -> Result<()> {
        debug!(bucket = self.stage.bucket(), "multipart aborter has started.");

        let bucket = self.stage.bucket().to_string();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            if self.stage.cancellation_token.is_cancelled() {
                info!(bucket = bucket, "multipart aborter has been cancelled.");
                break;
            }

            let page = match self
                .stage
                .target
                .list_multipart_uploads(
                    &bucket,
                    key_marker.as_deref(),
                    upload_id_marker.as_deref(),
                    MAX_UPLOADS,
                )
                .await
            {
                Ok(page) => page,
                Err(e) if is_credential_error(&e) => return Err(e),
                Err(e) => {
                    warn!(
                        bucket = bucket,
                        error = format!("{e:#}"),
                        "listing multipart uploads failed, stop aborting."
                    );
                    self.stage.set_warning();
                    break;
                }
            };

            for upload in &page.uploads {
                if self.stage.cancellation_token.is_cancelled() {
                    info!(bucket = bucket, "multipart aborter has been cancelled.");
                    return Ok(());
                }

                match self
                    .stage
                    .target
                    .abort_multipart_upload(&bucket, &upload.key, &upload.upload_id)
                    .await
                {
                    Ok(()) => {
                        self.stage.stats.record_aborted_upload();
                        debug!(
                            bucket = bucket,
                            key = upload.key,
                            upload_id = upload.upload_id,
                            "multipart upload aborted."
                        );
                    }
                    Err(e) if is_credential_error(&e) => return Err(e),
                    Err(e) => {
                        warn!(
                            bucket = bucket,
                            key = upload.key,
                            upload_id = upload.upload_id,
                            error = format!("{e:#}"),
                            "abort multipart upload failed."
                        );
                        self.stage.set_warning();
                    }
                }
            }

            if !page.is_truncated {
                break;
            }
            if page.next_key_marker.is_none() && page.next_upload_id_marker.is_none() {
                break;
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
        }

        debug!(bucket = bucket, "multipart aborter has been completed.");
        Ok(())
    }
}
