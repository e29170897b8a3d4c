use anyhow::Result;
use reqwest::Method;
use tracing::debug;

use super::{RgwClient, invalid_argument};
use crate::storage::rgw::object_path;

const NEXT_APPEND_POSITION: &str = "x-rgw-next-append-position";

impl RgwClient {
    /// Append `body` to `bucket/key` at byte offset `position`.
    ///
    /// The first append must use position 0. Returns the position for the
    /// next append when the gateway reports it.
    pub async fn append_object(
        &self,
        bucket: &str,
        key: &str,
        position: u64,
        body: Vec<u8>,
    ) -> Result<Option<u64>> {
        if bucket.is_empty() || key.is_empty() {
            return Err(invalid_argument("bucket and key are required"));
        }

        let path = format!("{}?append&position={position}", object_path(bucket, key));
        let builder = self.client.request(Method::PUT, &path)?.body(body);
        let response = self.client.send_checked(builder).await?;

        let next_position = next_append_position(response.headers());
        debug!(
            bucket = bucket,
            key = key,
            position = position,
            next_position = next_position,
            "object appended."
        );

        Ok(next_position)
    }
}

fn next_append_position(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(NEXT_APPEND_POSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
