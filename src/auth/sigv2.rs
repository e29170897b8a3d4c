//! AWS Signature Version 2 request signing.
//!
//! ```text
//! Authorization = "AWS " + AccessKeyId + ":" + Base64(HMAC-SHA1(SecretKey, StringToSign))
//!
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedAmzHeaders +
//!                CanonicalizedResource
//! ```

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE, HeaderMap, HeaderValue};
use sha1::Sha1;
use tracing::info;
use url::Url;

use crate::auth::CredentialsProvider;
use crate::types::AccessKeys;

type HmacSha1 = Hmac<Sha1>;

/// RFC 1123 with a numeric zone, always rendered in UTC.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

const AMZ_HEADER_PREFIX: &str = "x-amz";
const SECURITY_TOKEN_HEADER: &str = "x-amz-security-token";

/// Query keys that belong to the canonical resource, in signing order.
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// The string that was signed and the resulting signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningOutput {
    pub string_to_sign: String,
    pub signature: String,
}

/// Signs outgoing requests with the current credentials.
#[derive(Debug, Clone)]
pub struct SignerV2 {
    credentials: CredentialsProvider,
    debug_signing: bool,
}

impl SignerV2 {
    pub fn new(credentials: CredentialsProvider, debug_signing: bool) -> Self {
        Self {
            credentials,
            debug_signing,
        }
    }

    pub async fn credentials(&self) -> Result<AccessKeys> {
        self.credentials.credentials().await
    }

    /// Sign `request` in place using the current time.
    pub async fn sign(&self, request: &mut Request) -> Result<SigningOutput> {
        self.sign_at(request, Utc::now()).await
    }

    /// Sign `request` in place as of `time`.
    pub async fn sign_at(
        &self,
        request: &mut Request,
        time: DateTime<Utc>,
    ) -> Result<SigningOutput> {
        let access_keys = self.credentials.credentials().await?;
        let output = sign_request(request, &access_keys, time)?;

        if self.debug_signing {
            info!(
                method = %request.method(),
                url = %request.url(),
                "request signature:\n---[ STRING TO SIGN ]---\n{}\n---[ SIGNATURE ]---\n{}",
                output.string_to_sign,
                output.signature,
            );
        }

        Ok(output)
    }
}

/// Attach `Date`, `X-Amz-Security-Token` (when a session token exists) and
/// `Authorization` to `request`.
pub fn sign_request(
    request: &mut Request,
    access_keys: &AccessKeys,
    time: DateTime<Utc>,
) -> Result<SigningOutput> {
    let date = time.format(DATE_FORMAT).to_string();
    let headers = request.headers_mut();
    headers.insert(DATE, header_value(&date)?);
    if let Some(session_token) = access_keys.session_token() {
        headers.insert(SECURITY_TOKEN_HEADER, header_value(session_token)?);
    }

    let string_to_sign =
        build_string_to_sign(request.method().as_str(), request.headers(), request.url());
    let signature = compute_signature(&access_keys.secret_access_key, &string_to_sign)?;

    let authorization = format!("AWS {}:{}", access_keys.access_key, signature);
    request
        .headers_mut()
        .insert(AUTHORIZATION, header_value(&authorization)?);

    Ok(SigningOutput {
        string_to_sign,
        signature,
    })
}

pub fn build_string_to_sign(method: &str, headers: &HeaderMap, url: &Url) -> String {
    let content_md5 = header_str(headers, "content-md5");
    let content_type = header_str(headers, CONTENT_TYPE.as_str());
    let date = header_str(headers, DATE.as_str());

    format!(
        "{method}\n{content_md5}\n{content_type}\n{date}\n{}{}",
        canonicalized_amz_headers(headers),
        canonicalized_resource(url)
    )
}

/// Lower-cased `x-amz*` headers, sorted by name, one `name:value` per line.
pub fn canonicalized_amz_headers(headers: &HeaderMap) -> String {
    let mut amz_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, value) in headers {
        let name = name.as_str().to_ascii_lowercase();
        if !name.starts_with(AMZ_HEADER_PREFIX) {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
        amz_headers.entry(name).or_default().push(value);
    }

    let items: Vec<String> = amz_headers
        .iter()
        .map(|(name, values)| strip_excess_spaces(&format!("{name}:{}", values.join(","))))
        .collect();

    if items.is_empty() {
        return String::new();
    }
    format!("{}\n", items.join("\n"))
}

/// `[/bucket]` + escaped path + selected sub-resources.
pub fn canonicalized_resource(url: &Url) -> String {
    let mut resource = String::new();

    if let Some(host) = url.host_str() {
        if host.matches('.').count() == 4 {
            if let Some(bucket) = host.split('.').next() {
                resource.push('/');
                resource.push_str(bucket);
            }
        }
    }

    let path = url.path();
    if path.is_empty() {
        resource.push('/');
    } else {
        resource.push_str(path);
    }

    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut sub_resources = Vec::new();
    for sub_resource in SUB_RESOURCES {
        for (_, value) in query.iter().filter(|(key, _)| key == sub_resource) {
            if value.is_empty() {
                sub_resources.push(sub_resource.to_string());
            } else {
                sub_resources.push(format!("{sub_resource}={value}"));
            }
        }
    }

    if !sub_resources.is_empty() {
        resource.push('?');
        resource.push_str(&sub_resources.join("&"));
    }

    resource
}

/// Base64(HMAC-SHA1(secret, string_to_sign)).
pub fn compute_signature(secret_access_key: &str, string_to_sign: &str) -> Result<String> {
    let mut mac = <HmacSha1 as KeyInit>::new_from_slice(secret_access_key.as_bytes())
        .map_err(|e| anyhow!("invalid HMAC key: {e}"))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Trim surrounding spaces and collapse interior runs of spaces to one.
pub fn strip_excess_spaces(value: &str) -> String {
    let mut stripped = String::with_capacity(value.len());
    let mut previous_space = false;
    for c in value.trim_matches(' ').chars() {
        if c == ' ' {
            if !previous_space {
                stripped.push(c);
            }
            previous_space = true;
        } else {
            stripped.push(c);
            previous_space = false;
        }
    }
    stripped
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| anyhow!("invalid header value: {e}"))
}
