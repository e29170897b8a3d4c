//! Batch deletion using the DeleteObjects API in quiet mode.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::storage::Storage;
use crate::types::ObjectIdentifier;

use super::{DeleteResult, Deleter};

/// Deletes a whole batch with one DeleteObjects request.
///
/// The worker never hands over more than the effective batch size, so a
/// batch is always within the 1000-key request limit.
pub struct BatchDeleter {
    target: Storage,
}

impl BatchDeleter {
    pub fn new(target: Storage) -> Self {
        Self { target }
    }
}

#[async_trait]
impl Deleter for BatchDeleter {
    async fn delete(&self, bucket: &str, objects: &[ObjectIdentifier]) -> Result<DeleteResult> {
        if objects.is_empty() {
            return Ok(DeleteResult::default());
        }

        debug!(
            batch_size = objects.len(),
            "sending DeleteObjects batch request."
        );

        let failed = self.target.delete_objects(bucket, objects).await?;

        let failed_keys: HashSet<(&str, Option<&str>)> = failed
            .iter()
            .map(|e| (e.key.as_str(), e.version_id.as_deref()))
            .collect();
        let deleted = objects
            .iter()
            .filter(|o| !failed_keys.contains(&(o.key.as_str(), o.version_id.as_deref())))
            .cloned()
            .collect();

        Ok(DeleteResult { deleted, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockStorage, init_dummy_tracing_subscriber};
    use crate::types::error::RgwboxError;

    fn objects() -> Vec<ObjectIdentifier> {
        vec![
            ObjectIdentifier::new("k1", Some("v1".to_string())),
            ObjectIdentifier::new("k2", None),
            ObjectIdentifier::new("k3", Some("v3".to_string())),
        ]
    }

    #[tokio::test]
    async fn whole_batch_in_one_request() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new();
        let deleter = BatchDeleter::new(storage.boxed());

        let result = deleter.delete("abc", &objects()).await.unwrap();

        assert_eq!(result.deleted, objects());
        assert_eq!(storage.delete_objects_batches(), vec![3]);
    }

    #[tokio::test]
    async fn per_key_errors_are_split_out() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new().with_failing_key("k2");
        let deleter = BatchDeleter::new(storage.boxed());

        let result = deleter.delete("abc", &objects()).await.unwrap();

        assert_eq!(result.deleted.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].key, "k2");
        assert_eq!(result.failed[0].code, "AccessDenied");
    }

    #[tokio::test]
    async fn empty_batch_sends_nothing() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new();
        let deleter = BatchDeleter::new(storage.boxed());

        let result = deleter.delete("abc", &[]).await.unwrap();

        assert_eq!(result, DeleteResult::default());
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn request_failure_is_returned() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new()
            .with_delete_error(RgwboxError::service(503, "SlowDown", "reduce rate"));
        let deleter = BatchDeleter::new(storage.boxed());

        assert!(deleter.delete("abc", &objects()).await.is_err());
    }
}
