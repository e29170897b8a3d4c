//! RADOS Gateway specific APIs: appendable objects, pubsub topics and bucket
//! notifications, and the admin REST API.
//!
//! Every call goes through [`StorageClient`] and is V2-signed.

use anyhow::{Result, anyhow};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::client::{StorageClient, check_status};
use crate::storage::rgw::xml::from_xml;
use crate::types::error::RgwboxError;

pub mod admin;
pub mod append;
pub mod pubsub;

#[derive(Debug, Clone)]
pub struct RgwClient {
    client: StorageClient,
}

impl RgwClient {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &StorageClient {
        &self.client
    }

    async fn send_text(&self, builder: RequestBuilder) -> Result<String> {
        let response = self.client.send_checked(builder).await?;
        response
            .text()
            .await
            .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.send_text(builder).await?;
        serde_json::from_str(&body)
            .map_err(|e| anyhow!(RgwboxError::MalformedResponse(e.to_string())))
    }

    async fn send_xml<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.send_text(builder).await?;
        from_xml(&body)
    }

    /// Like `send_xml`, but a 404 yields `None`.
    async fn send_xml_optional<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>> {
        let response = self.client.send(builder).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| anyhow!(RgwboxError::Transport(e.to_string())))?;
        from_xml(&body).map(Some)
    }
}

fn invalid_argument(message: &str) -> anyhow::Error {
    anyhow!(RgwboxError::InvalidArgument(message.to_string()))
}
