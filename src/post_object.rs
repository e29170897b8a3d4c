//! Browser-style POST upload authenticated by a SigV4-signed policy.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::Response;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::auth::sigv4;
use crate::client::{StorageClient, check_status};
use crate::types::AccessKeys;
use crate::types::error::RgwboxError;

const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_STAMP_FORMAT: &str = "%Y%m%d";

#[derive(Serialize)]
struct PolicyDocument {
    expiration: String,
    conditions: Vec<serde_json::Value>,
}

/// Signed policy and the form fields that carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPolicy {
    pub key: String,
    pub credential: String,
    pub amz_date: String,
    /// Base64 of the policy document.
    pub policy: String,
    pub signature: String,
}

impl PostPolicy {
    /// Form fields in the order they are sent, before the file part.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.key.clone()),
            ("x-amz-algorithm", sigv4::ALGORITHM.to_string()),
            ("x-amz-credential", self.credential.clone()),
            ("x-amz-date", self.amz_date.clone()),
            ("Policy", self.policy.clone()),
            ("X-Amz-Signature", self.signature.clone()),
        ]
    }
}

pub fn build_post_policy(
    bucket: &str,
    key: &str,
    expiration: DateTime<Utc>,
    region: &str,
    access_keys: &AccessKeys,
    now: DateTime<Utc>,
) -> Result<PostPolicy> {
    let date_stamp = now.format(DATE_STAMP_FORMAT).to_string();
    let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
    let credential = sigv4::credential_scope(&access_keys.access_key, &date_stamp, region);

    let document = PolicyDocument {
        expiration: expiration.format(EXPIRATION_FORMAT).to_string(),
        conditions: vec![
            json!({ "bucket": bucket }),
            json!({ "key": key }),
            json!({ "x-amz-algorithm": sigv4::ALGORITHM }),
            json!({ "x-amz-credential": credential }),
            json!({ "x-amz-date": amz_date }),
        ],
    };
    let policy = BASE64.encode(serde_json::to_vec(&document)?);

    let signing_key = sigv4::derive_signing_key(
        &access_keys.secret_access_key,
        &date_stamp,
        region,
        sigv4::SERVICE,
    )?;
    let signature = sigv4::compute_signature(&signing_key, &policy)?;

    Ok(PostPolicy {
        key: key.to_string(),
        credential,
        amz_date,
        policy,
        signature,
    })
}

/// Upload `file_path` as `bucket/key` with a multipart POST. The request is
/// not V2-signed; the policy authenticates it.
pub async fn post_object(
    client: &StorageClient,
    bucket: &str,
    key: &str,
    expiration: DateTime<Utc>,
    region: &str,
    file_path: &Path,
) -> Result<Response> {
    if bucket.is_empty() || key.is_empty() {
        return Err(anyhow!(RgwboxError::InvalidArgument(
            "bucket and key are required".to_string()
        )));
    }

    let access_keys = client.signer().credentials().await?;
    let post_policy = build_post_policy(bucket, key, expiration, region, &access_keys, Utc::now())?;

    let content = tokio::fs::read(file_path)
        .await
        .with_context(|| format!("failed to read {}", file_path.display()))?;

    let form = post_policy
        .fields()
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value))
        .part("file", Part::bytes(content).file_name(key.to_string()));

    debug!(bucket = bucket, key = key, "sending POST object request.");

    let response = client
        .http()
        .post(client.url(&format!("/{bucket}"))?)
        .multipart(form)
        .send()
        .await
        .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))?;

    check_status(response).await
}
