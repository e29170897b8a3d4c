//! Single-object deletion using the DeleteObject API.
//!
//! Used when batch_size is 0.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::storage::Storage;
use crate::types::ObjectIdentifier;

use super::{DeleteResult, Deleter};

/// Deletes objects one request at a time.
pub struct SingleDeleter {
    target: Storage,
}

impl SingleDeleter {
    pub fn new(target: Storage) -> Self {
        Self { target }
    }
}

#[async_trait]
impl Deleter for SingleDeleter {
    async fn delete(&self, bucket: &str, objects: &[ObjectIdentifier]) -> Result<DeleteResult> {
        let mut result = DeleteResult::default();

        for object in objects {
            debug!(
                key = object.key,
                version_id = object.version_id,
                "sending DeleteObject request."
            );

            self.target
                .delete_object(bucket, &object.key, object.version_id.as_deref())
                .await?;

            result.deleted.push(object.clone());
        }

        Ok(result)
    }
}
