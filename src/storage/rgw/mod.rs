use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use leaky_bucket::RateLimiter;
use md5::{Digest, Md5};
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use urlencoding::encode;

use crate::client::StorageClient;
use crate::storage::StorageTrait;
use crate::types::error::RgwboxError;
use crate::types::{DeleteError, ObjectIdentifier, UploadPage, VersionPage};

pub mod xml;

/// Path-style S3 bucket operations against a RADOS Gateway.
#[derive(Clone)]
pub struct RgwStorage {
    client: StorageClient,
    rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
}

impl RgwStorage {
    pub fn new(
        client: StorageClient,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            client,
            rate_limit_objects_per_sec,
        }
    }

    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire_one().await;
        }
    }

    /// Acquire one token per object of a batched request.
    async fn exec_rate_limit_objects_per_sec_n(&self, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire(count).await;
        }
    }

    async fn get_text(&self, path_and_query: &str) -> Result<String> {
        let builder = self.client.request(Method::GET, path_and_query)?;
        let response = self.client.send_checked(builder).await?;
        response
            .text()
            .await
            .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))
    }
}

/// Percent-encode an object key for use in a path, keeping `/` separators.
pub fn encode_key(key: &str) -> String {
    encode(key).replace("%2F", "/")
}

pub fn object_path(bucket: &str, key: &str) -> String {
    format!("/{}/{}", encode(bucket), encode_key(key))
}

/// Code and message of a service error, for log fields.
fn error_details(e: &anyhow::Error) -> (String, String) {
    match e.downcast_ref::<RgwboxError>() {
        Some(RgwboxError::Service { code, message, .. }) => (code.clone(), message.clone()),
        _ => ("unknown".to_string(), e.to_string()),
    }
}

#[async_trait]
impl StorageTrait for RgwStorage {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let body = self.get_text("/").await.inspect_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(e);
            tracing::error!(
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 ListBuckets API call failed: {} ({}).",
                s3_error_code,
                s3_error_message,
            );
        })?;

        Ok(xml::from_xml::<xml::ListAllMyBucketsResult>(&body)?.into_names())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
        max_keys: i32,
    ) -> Result<VersionPage> {
        let mut path = format!("/{}?versions&max-keys={max_keys}", encode(bucket));
        if let Some(key_marker) = key_marker {
            path.push_str(&format!("&key-marker={}", encode(key_marker)));
        }
        if let Some(version_id_marker) = version_id_marker {
            path.push_str(&format!("&version-id-marker={}", encode(version_id_marker)));
        }

        let body = self.get_text(&path).await.inspect_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(e);
            tracing::error!(
                bucket = bucket,
                key_marker = key_marker,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 ListObjectVersions API call failed for bucket '{}': {} ({}).",
                bucket,
                s3_error_code,
                s3_error_message,
            );
        })?;

        Ok(xml::from_xml::<xml::ListVersionsResult>(&body)?.into())
    }

    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key_marker: Option<&str>,
        upload_id_marker: Option<&str>,
        max_uploads: i32,
    ) -> Result<UploadPage> {
        let mut path = format!("/{}?uploads&max-uploads={max_uploads}", encode(bucket));
        if let Some(key_marker) = key_marker {
            path.push_str(&format!("&key-marker={}", encode(key_marker)));
        }
        if let Some(upload_id_marker) = upload_id_marker {
            path.push_str(&format!("&upload-id-marker={}", encode(upload_id_marker)));
        }

        let body = self.get_text(&path).await.inspect_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(e);
            tracing::error!(
                bucket = bucket,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 ListMultipartUploads API call failed for bucket '{}': {} ({}).",
                bucket,
                s3_error_code,
                s3_error_message,
            );
        })?;

        Ok(xml::from_xml::<xml::ListMultipartUploadsResult>(&body)?.into())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        let path = format!("{}?uploadId={}", object_path(bucket, key), encode(upload_id));
        let builder = self.client.request(Method::DELETE, &path)?;

        self.client.send_checked(builder).await.map_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(&e);
            tracing::warn!(
                bucket = bucket,
                key = key,
                upload_id = upload_id,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 AbortMultipartUpload API call failed for s3://{}/{}: {} ({}).",
                bucket,
                key,
                s3_error_code,
                s3_error_message,
            );
            e.context("AbortMultipartUpload failed.")
        })?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<()> {
        self.exec_rate_limit_objects_per_sec().await;

        let mut path = object_path(bucket, key);
        if let Some(version_id) = version_id {
            path.push_str(&format!("?versionId={}", encode(version_id)));
        }
        let builder = self.client.request(Method::DELETE, &path)?;

        self.client.send_checked(builder).await.map_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(&e);
            tracing::warn!(
                bucket = bucket,
                key = key,
                version_id = version_id,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 DeleteObject API call failed for s3://{}/{}: {} ({}).",
                bucket,
                key,
                s3_error_code,
                s3_error_message,
            );
            e.context("DeleteObject failed.")
        })?;

        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        objects: &[ObjectIdentifier],
    ) -> Result<Vec<DeleteError>> {
        self.exec_rate_limit_objects_per_sec_n(objects.len()).await;

        let object_count = objects.len();
        let body = xml::to_xml(&xml::DeleteRequest::quiet(objects))
            .context("failed to build DeleteObjects request body")?;
        let content_md5 = BASE64.encode(Md5::digest(body.as_bytes()));

        let builder = self
            .client
            .request(Method::POST, &format!("/{}?delete", encode(bucket)))?
            .header(CONTENT_TYPE, "application/xml")
            .header("Content-MD5", content_md5)
            .body(body);

        let response = self.client.send_checked(builder).await.map_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(&e);
            tracing::error!(
                bucket = bucket,
                object_count = object_count,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 DeleteObjects API call failed for {} objects in bucket '{}': {} ({}).",
                object_count,
                bucket,
                s3_error_code,
                s3_error_message,
            );
            e.context("DeleteObjects failed.")
        })?;

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let result: xml::DeleteResult = xml::from_xml(&body)?;
        Ok(result.error.into_iter().map(Into::into).collect())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let builder = self
            .client
            .request(Method::DELETE, &format!("/{}", encode(bucket)))?;

        self.client.send_checked(builder).await.map_err(|e| {
            let (s3_error_code, s3_error_message) = error_details(&e);
            tracing::error!(
                bucket = bucket,
                s3_error_code = s3_error_code,
                s3_error_message = s3_error_message,
                "S3 DeleteBucket API call failed for bucket '{}': {} ({}).",
                bucket,
                s3_error_code,
                s3_error_message,
            );
            e
        })?;

        Ok(())
    }
}
