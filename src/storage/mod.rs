use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;

use crate::client::StorageClient;
use crate::types::{DeleteError, ObjectIdentifier, UploadPage, VersionPage};

pub mod rgw;

pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Bucket-level S3 operations needed to drain buckets.
///
/// Every method takes the bucket it operates on, so one storage instance
/// serves a whole sweep.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Names of all buckets owned by the caller.
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// One page of object versions and delete markers.
    async fn list_object_versions(
        &self,
        bucket: &str,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
        max_keys: i32,
    ) -> Result<VersionPage>;

    /// One page of in-progress multipart uploads.
    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key_marker: Option<&str>,
        upload_id_marker: Option<&str>,
        max_uploads: i32,
    ) -> Result<UploadPage>;

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>)
    -> Result<()>;

    /// Quiet-mode DeleteObjects; returns only the per-key failures.
    ///
    /// The caller keeps `objects` at or below 1000 entries.
    async fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectIdentifier],
    ) -> Result<Vec<DeleteError>>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

dyn_clone::clone_trait_object!(StorageTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

/// Limiter shared by all workers, refilled every 100ms.
pub fn build_rate_limiter(rate_limit_objects: Option<u32>) -> Option<Arc<RateLimiter>> {
    rate_limit_objects.map(|rate_limit_value| {
        let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
            1
        } else {
            rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
        };
        Arc::new(
            RateLimiter::builder()
                .max(rate_limit_value as usize)
                .initial(rate_limit_value as usize)
                .refill(refill)
                .fair(true)
                .build(),
        )
    })
}

/// Gateway-backed storage for `client`.
pub fn create_storage(client: StorageClient, rate_limit_objects: Option<u32>) -> Storage {
    Box::new(rgw::RgwStorage::new(
        client,
        build_rate_limiter(rate_limit_objects),
    ))
}
