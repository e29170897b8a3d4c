//! Shared test utilities for the rgwbox library crate.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::config::DrainConfig;
use crate::storage::{Storage, StorageTrait};
use crate::types::error::RgwboxError;
use crate::types::{DeleteError, MultipartUpload, ObjectIdentifier, UploadPage, VersionPage};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Drain configuration with a single worker and no final DeleteBucket.
pub(crate) fn make_test_drain_config(bucket: &str) -> DrainConfig {
    DrainConfig {
        bucket: bucket.to_string(),
        worker_size: 1,
        queue_size: 1000,
        batch_size: 1000,
        delete_bucket_after: false,
        max_keys: 1000,
        rate_limit_objects: None,
        show_no_progress: true,
    }
}

/// Storage call as seen by [`MockStorage`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListBuckets,
    ListObjectVersions {
        bucket: String,
        key_marker: Option<String>,
        version_id_marker: Option<String>,
    },
    ListMultipartUploads {
        bucket: String,
    },
    AbortMultipartUpload {
        bucket: String,
        key: String,
        upload_id: String,
    },
    DeleteObject {
        bucket: String,
        object: ObjectIdentifier,
    },
    DeleteObjects {
        bucket: String,
        objects: Vec<ObjectIdentifier>,
    },
    DeleteBucket {
        bucket: String,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    object: ObjectIdentifier,
    is_delete_marker: bool,
}

#[derive(Default)]
struct MockState {
    buckets: Mutex<BTreeMap<String, Vec<Entry>>>,
    uploads: Mutex<BTreeMap<String, Vec<MultipartUpload>>>,
    calls: Mutex<Vec<Call>>,
    listing_error: Mutex<Option<RgwboxError>>,
    delete_error: Mutex<Option<RgwboxError>>,
    abort_error: Mutex<Option<RgwboxError>>,
    delete_bucket_errors: Mutex<BTreeMap<String, RgwboxError>>,
    failing_keys: Mutex<HashSet<String>>,
    cancel_on_delete: Mutex<Option<crate::types::token::PipelineCancellationToken>>,
    delete_bucket_called: AtomicBool,
}

/// In-memory [`StorageTrait`] that pages fixed inventories, records every
/// call and injects configured failures.
///
/// Clones share state, so a test keeps one handle while the drain owns
/// boxed clones.
#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    state: Arc<MockState>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    /// Add an empty bucket.
    pub(crate) fn with_bucket(self, bucket: &str) -> Self {
        self.state
            .buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default();
        self
    }

    pub(crate) fn with_versions(self, bucket: &str, versions: &[(&str, &str)]) -> Self {
        self.add_entries(bucket, versions, false);
        self
    }

    pub(crate) fn with_delete_markers(self, bucket: &str, markers: &[(&str, &str)]) -> Self {
        self.add_entries(bucket, markers, true);
        self
    }

    /// Add `count` single-version objects named `key-00000`, `key-00001`, ...
    pub(crate) fn with_generated_versions(self, bucket: &str, count: usize) -> Self {
        {
            let mut buckets = self.state.buckets.lock().unwrap();
            let entries = buckets.entry(bucket.to_string()).or_default();
            for i in 0..count {
                entries.push(Entry {
                    object: ObjectIdentifier::new(format!("key-{i:05}"), Some("v1".to_string())),
                    is_delete_marker: false,
                });
            }
            entries.sort_by(|a, b| a.object.key.cmp(&b.object.key));
        }
        self
    }

    pub(crate) fn with_uploads(self, bucket: &str, uploads: &[(&str, &str)]) -> Self {
        self.state
            .uploads
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .extend(uploads.iter().map(|(key, upload_id)| MultipartUpload {
                key: key.to_string(),
                upload_id: upload_id.to_string(),
            }));
        self
    }

    /// Every listing call fails with `error`.
    pub(crate) fn with_listing_error(self, error: RgwboxError) -> Self {
        *self.state.listing_error.lock().unwrap() = Some(error);
        self
    }

    /// Every DeleteObject / DeleteObjects call fails with `error`.
    pub(crate) fn with_delete_error(self, error: RgwboxError) -> Self {
        *self.state.delete_error.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn with_abort_error(self, error: RgwboxError) -> Self {
        *self.state.abort_error.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn with_delete_bucket_error(self, bucket: &str, error: RgwboxError) -> Self {
        self.state
            .delete_bucket_errors
            .lock()
            .unwrap()
            .insert(bucket.to_string(), error);
        self
    }

    /// Deleting `key` fails: per-key error in batches, request error otherwise.
    pub(crate) fn with_failing_key(self, key: &str) -> Self {
        self.state
            .failing_keys
            .lock()
            .unwrap()
            .insert(key.to_string());
        self
    }

    /// Cancel `token` during the first delete request.
    pub(crate) fn cancel_on_delete(
        self,
        token: crate::types::token::PipelineCancellationToken,
    ) -> Self {
        *self.state.cancel_on_delete.lock().unwrap() = Some(token);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub(crate) fn delete_object_calls(&self) -> Vec<ObjectIdentifier> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteObject { object, .. } => Some(object),
                _ => None,
            })
            .collect()
    }

    /// Sizes of the DeleteObjects requests, in call order.
    pub(crate) fn delete_objects_batches(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteObjects { objects, .. } => Some(objects.len()),
                _ => None,
            })
            .collect()
    }

    /// Every identifier sent to either delete API.
    pub(crate) fn deleted_objects(&self) -> Vec<ObjectIdentifier> {
        self.calls()
            .into_iter()
            .flat_map(|c| match c {
                Call::DeleteObject { object, .. } => vec![object],
                Call::DeleteObjects { objects, .. } => objects,
                _ => vec![],
            })
            .collect()
    }

    pub(crate) fn delete_bucket_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteBucket { bucket } => Some(bucket),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn delete_bucket_called(&self) -> bool {
        self.state.delete_bucket_called.load(Ordering::SeqCst)
    }

    fn add_entries(&self, bucket: &str, items: &[(&str, &str)], is_delete_marker: bool) {
        let mut buckets = self.state.buckets.lock().unwrap();
        let entries = buckets.entry(bucket.to_string()).or_default();
        entries.extend(items.iter().map(|(key, version_id)| Entry {
            object: ObjectIdentifier::new(*key, Some(version_id.to_string())),
            is_delete_marker,
        }));
        entries.sort_by(|a, b| {
            (&a.object.key, &a.object.version_id).cmp(&(&b.object.key, &b.object.version_id))
        });
    }

    fn record(&self, call: Call) {
        self.state.calls.lock().unwrap().push(call);
    }

    fn injected(&self, slot: &Mutex<Option<RgwboxError>>) -> Result<()> {
        match slot.lock().unwrap().clone() {
            Some(error) => Err(anyhow!(error)),
            None => Ok(()),
        }
    }

    fn cancel_if_requested(&self) {
        if let Some(token) = self.state.cancel_on_delete.lock().unwrap().take() {
            token.cancel();
        }
    }

    fn is_failing(&self, key: &str) -> bool {
        self.state.failing_keys.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.record(Call::ListBuckets);
        self.injected(&self.state.listing_error)?;
        Ok(self.state.buckets.lock().unwrap().keys().cloned().collect())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
        max_keys: i32,
    ) -> Result<VersionPage> {
        self.record(Call::ListObjectVersions {
            bucket: bucket.to_string(),
            key_marker: key_marker.map(str::to_string),
            version_id_marker: version_id_marker.map(str::to_string),
        });
        self.injected(&self.state.listing_error)?;

        let buckets = self.state.buckets.lock().unwrap();
        let entries = buckets.get(bucket).ok_or_else(|| {
            anyhow!(RgwboxError::service(
                404,
                "NoSuchBucket",
                "The specified bucket does not exist"
            ))
        })?;

        let start = match key_marker {
            Some(key_marker) => entries
                .iter()
                .position(|e| {
                    (e.object.key.as_str(), e.object.version_id.as_deref())
                        > (key_marker, version_id_marker)
                })
                .unwrap_or(entries.len()),
            None => 0,
        };
        let end = (start + max_keys as usize).min(entries.len());
        let page = &entries[start..end];

        let mut result = VersionPage {
            is_truncated: end < entries.len(),
            ..VersionPage::default()
        };
        for entry in page {
            if entry.is_delete_marker {
                result.delete_markers.push(entry.object.clone());
            } else {
                result.versions.push(entry.object.clone());
            }
        }
        if result.is_truncated {
            if let Some(last) = page.last() {
                result.next_key_marker = Some(last.object.key.clone());
                result.next_version_id_marker = last.object.version_id.clone();
            }
        }
        Ok(result)
    }

    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key_marker: Option<&str>,
        upload_id_marker: Option<&str>,
        max_uploads: i32,
    ) -> Result<UploadPage> {
        self.record(Call::ListMultipartUploads {
            bucket: bucket.to_string(),
        });
        self.injected(&self.state.listing_error)?;

        let uploads = self.state.uploads.lock().unwrap();
        let all = uploads.get(bucket).cloned().unwrap_or_default();
        let start = match (key_marker, upload_id_marker) {
            (Some(key), Some(upload_id)) => all
                .iter()
                .position(|u| u.key == key && u.upload_id == upload_id)
                .map_or(all.len(), |i| i + 1),
            _ => 0,
        };
        let end = (start + max_uploads as usize).min(all.len());
        let page = all[start..end].to_vec();
        let is_truncated = end < all.len();

        Ok(UploadPage {
            is_truncated,
            next_key_marker: page.last().filter(|_| is_truncated).map(|u| u.key.clone()),
            next_upload_id_marker: page
                .last()
                .filter(|_| is_truncated)
                .map(|u| u.upload_id.clone()),
            uploads: page,
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.record(Call::AbortMultipartUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        });
        self.injected(&self.state.abort_error)
    }

    async fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<()> {
        self.record(Call::DeleteObject {
            bucket: bucket.to_string(),
            object: ObjectIdentifier::new(key, version_id.map(str::to_string)),
        });
        self.cancel_if_requested();
        self.injected(&self.state.delete_error)?;

        if self.is_failing(key) {
            return Err(anyhow!(RgwboxError::service(403, "AccessDenied", "Access Denied")));
        }
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectIdentifier],
    ) -> Result<Vec<DeleteError>> {
        self.record(Call::DeleteObjects {
            bucket: bucket.to_string(),
            objects: objects.to_vec(),
        });
        self.cancel_if_requested();
        self.injected(&self.state.delete_error)?;

        Ok(objects
            .iter()
            .filter(|o| self.is_failing(&o.key))
            .map(|o| DeleteError {
                key: o.key.clone(),
                version_id: o.version_id.clone(),
                code: "AccessDenied".to_string(),
                message: "Access Denied".to_string(),
            })
            .collect())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.record(Call::DeleteBucket {
            bucket: bucket.to_string(),
        });
        self.state.delete_bucket_called.store(true, Ordering::SeqCst);

        match self.state.delete_bucket_errors.lock().unwrap().get(bucket) {
            Some(error) => Err(anyhow!(error.clone())),
            None => Ok(()),
        }
    }
}
