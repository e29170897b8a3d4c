//! Pubsub topics and bucket notifications.
//!
//! Topics use the SNS-style form API served on `POST /`. Notifications are
//! the S3 `?notification` sub-resource of a bucket.

use std::collections::BTreeMap;

use anyhow::Result;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::form_urlencoded;
use urlencoding::encode;

use super::{RgwClient, invalid_argument};
use crate::storage::rgw::xml::to_xml;

const TOPIC_API_VERSION: &str = "2010-03-31";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Topic {
    pub user: String,
    pub name: String,
    pub end_point: TopicEndpoint,
    pub topic_arn: String,
    pub opaque_data: String,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TopicEndpoint {
    pub endpoint_address: String,
    pub endpoint_args: String,
    pub endpoint_topic: String,
    pub has_stored_secret: String,
    pub persistent: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ListTopicsResponse {
    list_topics_result: ListTopicsResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ListTopicsResult {
    topics: TopicMembers,
}

#[derive(Debug, Default, Deserialize)]
struct TopicMembers {
    #[serde(rename = "member", default)]
    members: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct GetTopicResponse {
    get_topic_result: GetTopicResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct GetTopicResult {
    topic: Topic,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CreateTopicResponse {
    create_topic_result: CreateTopicResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CreateTopicResult {
    topic_arn: String,
}

/// Notification configuration of a bucket, as sent and as returned.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfiguration {
    #[serde(rename = "TopicConfiguration")]
    pub topic_configurations: Vec<TopicConfiguration>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TopicConfiguration {
    pub id: String,
    pub topic: String,
    #[serde(rename = "Event")]
    pub events: Vec<String>,
    pub filter: NotificationFilter,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NotificationFilter {
    pub s3_key: FilterRules,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_metadata: Option<FilterRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_tags: Option<FilterRules>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    #[serde(rename = "FilterRule")]
    pub rules: Vec<FilterRule>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FilterRule {
    pub name: String,
    pub value: String,
}

impl FilterRule {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// One notification to attach to a bucket.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NotificationRequest {
    pub id: String,
    pub topic_arn: String,
    /// Event names such as `s3:ObjectCreated:*`.
    pub events: Vec<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Metadata filter rules, sent in key order.
    pub metadata: BTreeMap<String, String>,
}

impl NotificationRequest {
    fn to_configuration(&self) -> NotificationConfiguration {
        let key_rules = [("prefix", &self.prefix), ("suffix", &self.suffix)]
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| FilterRule::new(name, v))
            })
            .collect();

        let s3_metadata = (!self.metadata.is_empty()).then(|| FilterRules {
            rules: self
                .metadata
                .iter()
                .map(|(name, value)| FilterRule::new(name, value))
                .collect(),
        });

        NotificationConfiguration {
            topic_configurations: vec![TopicConfiguration {
                id: self.id.clone(),
                topic: self.topic_arn.clone(),
                events: self.events.clone(),
                filter: NotificationFilter {
                    s3_key: FilterRules { rules: key_rules },
                    s3_metadata,
                    s3_tags: None,
                },
            }],
        }
    }

    /// XML body of `PUT /{bucket}?notification`.
    pub fn to_xml_body(&self) -> Result<String> {
        Ok(format!(
            "{XML_DECLARATION}{}",
            to_xml(&self.to_configuration())?
        ))
    }
}

fn topic_form(action: &str, params: &[(&str, &str)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer
        .append_pair("Action", action)
        .append_pair("Version", TOPIC_API_VERSION);
    for (name, value) in params {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

impl RgwClient {
    fn topic_request(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::RequestBuilder> {
        Ok(self
            .client
            .request(Method::POST, "/")?
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(topic_form(action, params)))
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let builder = self.topic_request("ListTopics", &[])?;
        let response: ListTopicsResponse = self.send_xml(builder).await?;
        Ok(response.list_topics_result.topics.members)
    }

    /// Returns the ARN of the created topic.
    pub async fn create_topic(&self, name: &str, push_endpoint: &str) -> Result<String> {
        if name.is_empty() {
            return Err(invalid_argument("topic name can not be empty"));
        }

        let builder = self.topic_request(
            "CreateTopic",
            &[("Name", name), ("push-endpoint", push_endpoint)],
        )?;
        let response: CreateTopicResponse = self.send_xml(builder).await?;
        let topic_arn = response.create_topic_result.topic_arn;

        info!(topic = name, topic_arn = topic_arn, "topic created.");
        Ok(topic_arn)
    }

    /// `None` when the topic does not exist.
    pub async fn get_topic(&self, topic_arn: &str) -> Result<Option<Topic>> {
        let builder = self.topic_request("GetTopic", &[("TopicArn", topic_arn)])?;
        let response: Option<GetTopicResponse> = self.send_xml_optional(builder).await?;
        Ok(response.map(|r| r.get_topic_result.topic))
    }

    pub async fn delete_topic(&self, topic_arn: &str) -> Result<()> {
        let builder = self.topic_request("DeleteTopic", &[("TopicArn", topic_arn)])?;
        self.client.send_checked(builder).await?;

        info!(topic_arn = topic_arn, "topic deleted.");
        Ok(())
    }

    pub async fn create_notification(
        &self,
        bucket: &str,
        notification: &NotificationRequest,
    ) -> Result<()> {
        if bucket.is_empty() {
            return Err(invalid_argument("bucket can not be empty"));
        }

        let body = notification.to_xml_body()?;
        debug!(bucket = bucket, body = body, "creating notification.");

        let builder = self
            .client
            .request(Method::PUT, &format!("/{}?notification", encode(bucket)))?
            .header(CONTENT_TYPE, "application/xml")
            .body(body);
        self.client.send_checked(builder).await?;

        info!(
            bucket = bucket,
            notification_id = notification.id,
            "notification created."
        );
        Ok(())
    }

    /// Every notification of `bucket`, or only `id` when given. `None` when
    /// the bucket or notification does not exist.
    pub async fn get_notification(
        &self,
        bucket: &str,
        id: Option<&str>,
    ) -> Result<Option<NotificationConfiguration>> {
        if bucket.is_empty() {
            return Err(invalid_argument("bucket can not be empty"));
        }

        let mut path = format!("/{}?notification", encode(bucket));
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            path.push_str(&format!("={}", encode(id)));
        }

        let builder = self.client.request(Method::GET, &path)?;
        self.send_xml_optional(builder).await
    }

    pub async fn delete_notification(&self, bucket: &str, id: &str) -> Result<()> {
        if bucket.is_empty() {
            return Err(invalid_argument("bucket can not be empty"));
        }

        let path = format!("/{}?notification={}", encode(bucket), encode(id));
        let builder = self.client.request(Method::DELETE, &path)?;
        self.client.send_checked(builder).await?;

        info!(bucket = bucket, notification_id = id, "notification deleted.");
        Ok(())
    }
}
