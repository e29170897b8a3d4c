//! Render a V2-signed request as a `curl` command line.
//!
//! Handy for replaying a gateway request by hand. Only path-style URLs and
//! small JSON or XML bodies are supported.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE, HeaderValue};
use reqwest::{Method, Request};
use url::Url;

use crate::auth::SignerV2;
use crate::types::error::RgwboxError;

const CONTENT_MD5: &str = "content-md5";
const SECURITY_TOKEN: &str = "x-amz-security-token";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyType {
    #[default]
    None,
    Json,
    Xml,
}

impl BodyType {
    fn content_type(self) -> Option<&'static str> {
        match self {
            BodyType::None => None,
            BodyType::Json => Some("application/json"),
            BodyType::Xml => Some("application/xml"),
        }
    }
}

/// Request to render. `body` is sent verbatim with `-d`, single-quoted for
/// the shell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurlRequest {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
    pub body_type: BodyType,
    pub content_md5: Option<String>,
}

pub async fn generate_curl_command(signer: &SignerV2, request: &CurlRequest) -> Result<String> {
    generate_curl_command_at(signer, request, Utc::now()).await
}

/// Like [`generate_curl_command`], signing as of `time`.
pub async fn generate_curl_command_at(
    signer: &SignerV2,
    request: &CurlRequest,
    time: DateTime<Utc>,
) -> Result<String> {
    let body = request.body.as_deref().filter(|b| !b.is_empty());

    if body.is_some() && request.method != "PUT" && request.method != "POST" {
        return Err(invalid_argument("only POST and PUT request should have body"));
    }
    let method = match request.method.as_str() {
        "HEAD" => Method::HEAD,
        "GET" => Method::GET,
        "PUT" => Method::PUT,
        "POST" => Method::POST,
        "DELETE" => Method::DELETE,
        _ => return Err(invalid_argument("invalid method")),
    };

    let url = Url::parse(&request.url)
        .map_err(|e| invalid_argument(&format!("invalid url {}: {e}", request.url)))?;
    let mut signed = Request::new(method.clone(), url);

    let mut command = format!("curl -i -v -X {method} ");

    if body.is_some() {
        let content_type = request
            .body_type
            .content_type()
            .ok_or_else(|| invalid_argument("unsupported body type"))?;
        signed
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        command.push_str(&format!("-H \"Content-Type: {content_type}\" "));
    }

    if let Some(content_md5) = request.content_md5.as_deref().filter(|m| !m.is_empty()) {
        let value = HeaderValue::from_str(content_md5)
            .map_err(|e| invalid_argument(&format!("invalid Content-MD5: {e}")))?;
        signed.headers_mut().insert(CONTENT_MD5, value);
        command.push_str(&format!("-H \"Content-MD5: {content_md5}\" "));
    }

    signer.sign_at(&mut signed, time).await?;

    let headers = signed.headers();
    command.push_str(&format!("-H \"Date: {}\" ", header_str(headers.get(DATE))));
    if let Some(token) = headers.get(SECURITY_TOKEN) {
        command.push_str(&format!("-H \"X-Amz-Security-Token: {}\" ", header_str(Some(token))));
    }
    command.push_str(&format!(
        "-H \"Authorization: {}\" \"{}\"",
        header_str(headers.get(AUTHORIZATION)),
        request.url
    ));

    if let Some(body) = body {
        let quoted = body.replace('\'', r"'\''");
        command.push_str(&format!(" -d '{quoted}'"));
    }

    Ok(command)
}

fn header_str(value: Option<&HeaderValue>) -> &str {
    value.and_then(|v| v.to_str().ok()).unwrap_or_default()
}

fn invalid_argument(message: &str) -> anyhow::Error {
    anyhow!(RgwboxError::InvalidArgument(message.to_string()))
}
