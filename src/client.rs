//! Signed HTTP access to the gateway.
//!
//! [`StorageClient`] pairs an endpoint with the V2 signer and an HTTP
//! client. Every request built from it is signed right before dispatch.

use anyhow::{Result, anyhow};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::trace;
use url::Url;

use crate::auth::SignerV2;
use crate::types::error::RgwboxError;

#[derive(Debug, Clone)]
pub struct StorageClient {
    endpoint: String,
    signer: SignerV2,
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new(endpoint: &str, signer: SignerV2, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            signer,
            http,
        }
    }

    /// Endpoint URL without a trailing `/`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn signer(&self) -> &SignerV2 {
        &self.signer
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Resolve `path_and_query` (starting with `/`) against the endpoint.
    pub fn url(&self, path_and_query: &str) -> Result<Url> {
        let url = format!("{}{}", self.endpoint, path_and_query);
        Url::parse(&url)
            .map_err(|e| anyhow!(RgwboxError::InvalidArgument(format!("invalid url {url}: {e}"))))
    }

    pub fn request(&self, method: Method, path_and_query: &str) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.url(path_and_query)?))
    }

    /// Sign `request` and dispatch it, returning the raw response whatever
    /// its status.
    pub async fn execute(&self, mut request: Request) -> Result<Response> {
        self.signer.sign(&mut request).await?;

        trace!(method = %request.method(), url = %request.url(), "sending request.");

        self.http
            .execute(request)
            .await
            .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))
    }

    /// Build, sign and dispatch.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|e| anyhow!(RgwboxError::InvalidArgument(e.to_string())))?;
        self.execute(request).await
    }

    /// Like [`send`](Self::send), but non-2xx responses become service errors.
    pub async fn send_checked(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.send(builder).await?;
        check_status(response).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// Pass 2xx responses through; turn anything else into a service error.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))?;
    Err(anyhow!(service_error(status, &body)))
}

/// Service error from a status and an S3 XML error body, falling back to
/// the reason phrase and raw body when the body is not an error document.
pub fn service_error(status: StatusCode, body: &str) -> RgwboxError {
    let parsed = quick_xml::de::from_str::<ErrorResponse>(body)
        .ok()
        .filter(|e| !e.code.is_empty());

    match parsed {
        Some(error) => RgwboxError::service(status.as_u16(), error.code, error.message),
        None => RgwboxError::service(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            body.trim(),
        ),
    }
}
