//! XML bodies of the S3 bucket APIs used by the drain.

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::error::RgwboxError;
use crate::types::{
    DeleteError, MultipartUpload, ObjectIdentifier, UploadPage, VersionPage,
};

pub fn from_xml<T: DeserializeOwned>(body: &str) -> Result<T> {
    quick_xml::de::from_str(body)
        .map_err(|e| anyhow!(RgwboxError::MalformedResponse(e.to_string())))
}

pub fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    quick_xml::se::to_string(value).map_err(|e| anyhow!("XML serialization failed: {e}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAllMyBucketsResult {
    #[serde(default)]
    pub buckets: Buckets,
}

#[derive(Debug, Default, Deserialize)]
pub struct Buckets {
    #[serde(rename = "Bucket", default)]
    pub bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketEntry {
    pub name: String,
}

impl ListAllMyBucketsResult {
    pub fn into_names(self) -> Vec<String> {
        self.buckets.bucket.into_iter().map(|b| b.name).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListVersionsResult {
    #[serde(default)]
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_version_id_marker: Option<String>,
    #[serde(default)]
    pub version: Vec<VersionEntry>,
    #[serde(default)]
    pub delete_marker: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionEntry {
    pub key: String,
    pub version_id: Option<String>,
}

impl From<VersionEntry> for ObjectIdentifier {
    fn from(entry: VersionEntry) -> Self {
        ObjectIdentifier::new(entry.key, entry.version_id)
    }
}

impl From<ListVersionsResult> for VersionPage {
    fn from(result: ListVersionsResult) -> Self {
        VersionPage {
            versions: result.version.into_iter().map(Into::into).collect(),
            delete_markers: result.delete_marker.into_iter().map(Into::into).collect(),
            is_truncated: result.is_truncated,
            next_key_marker: non_empty(result.next_key_marker),
            next_version_id_marker: non_empty(result.next_version_id_marker),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListMultipartUploadsResult {
    #[serde(default)]
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
    #[serde(default)]
    pub upload: Vec<UploadEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadEntry {
    pub key: String,
    pub upload_id: String,
}

impl From<ListMultipartUploadsResult> for UploadPage {
    fn from(result: ListMultipartUploadsResult) -> Self {
        UploadPage {
            uploads: result
                .upload
                .into_iter()
                .map(|u| MultipartUpload {
                    key: u.key,
                    upload_id: u.upload_id,
                })
                .collect(),
            is_truncated: result.is_truncated,
            next_key_marker: non_empty(result.next_key_marker),
            next_upload_id_marker: non_empty(result.next_upload_id_marker),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "Delete")]
pub struct DeleteRequest {
    #[serde(rename = "Quiet")]
    pub quiet: bool,
    #[serde(rename = "Object")]
    pub objects: Vec<DeleteRequestObject>,
}

#[derive(Debug, Serialize)]
pub struct DeleteRequestObject {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "VersionId", skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl DeleteRequest {
    pub fn quiet(objects: &[ObjectIdentifier]) -> Self {
        DeleteRequest {
            quiet: true,
            objects: objects
                .iter()
                .map(|o| DeleteRequestObject {
                    key: o.key.clone(),
                    version_id: o.version_id.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteResult {
    #[serde(default)]
    pub error: Vec<DeleteErrorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteErrorEntry {
    #[serde(default)]
    pub key: String,
    pub version_id: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<DeleteErrorEntry> for DeleteError {
    fn from(entry: DeleteErrorEntry) -> Self {
        DeleteError {
            key: entry.key,
            version_id: non_empty(entry.version_id),
            code: entry.code,
            message: entry.message,
        }
    }
}
