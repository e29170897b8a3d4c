//! Admin REST API (`/admin/user`, `/admin/bucket`).
//!
//! Requests carry their arguments in the query string; responses are JSON.
//! The caller's keys need the matching admin caps (`users`, `buckets`).

use anyhow::Result;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::form_urlencoded;

use super::{RgwClient, invalid_argument};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub tenant: String,
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub suspended: i64,
    pub max_buckets: i64,
    pub subusers: Vec<Subuser>,
    pub keys: Vec<KeyClass>,
    pub swift_keys: Vec<KeyClass>,
    pub caps: Vec<Capability>,
    pub op_mask: String,
    pub system: String,
    pub admin: String,
    pub bucket_quota: Quota,
    pub user_quota: Quota,
    pub temp_url_keys: Vec<String>,
    #[serde(rename = "type")]
    pub user_type: String,
    pub mfa_ids: Vec<String>,
    pub stats: Stats,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subuser {
    pub id: String,
    pub permissions: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capability {
    #[serde(rename = "type")]
    pub cap_type: String,
    pub perm: String,
}

/// User or bucket quota. Negative sizes mean unlimited.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quota {
    pub enabled: bool,
    pub check_on_raw: bool,
    pub max_size: i64,
    pub max_size_kb: i64,
    pub max_objects: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyClass {
    pub user: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub size: i64,
    pub size_actual: i64,
    pub size_utilized: i64,
    pub size_kb: i64,
    pub size_kb_actual: i64,
    pub size_kb_utilized: i64,
    pub num_objects: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketInfoElement {
    pub bucket: String,
    pub num_shards: i64,
    pub tenant: String,
    pub zonegroup: String,
    pub placement_rule: String,
    pub id: String,
    pub marker: String,
    pub owner: String,
    pub ver: String,
    pub master_ver: String,
    pub mtime: String,
    pub max_marker: String,
    pub usage: Usage,
    pub bucket_quota: Quota,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    #[serde(rename = "rgw.main")]
    pub rgw_main: Stats,
}

/// User fields sent as query parameters. Empty strings, `false` and zero
/// are left out of the request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserConf {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub key_type: String,
    pub access_key: String,
    pub secret_key: String,
    pub user_caps: String,
    pub generate_key: bool,
    pub suspended: i64,
    pub max_buckets: i64,
    pub tenant: String,
    pub system: bool,
    pub op_mask: String,
}

impl UserConf {
    pub fn with_uid(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            ..Self::default()
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let strings = [
            ("uid", &self.uid),
            ("display-name", &self.display_name),
            ("email", &self.email),
            ("key-type", &self.key_type),
            ("access-key", &self.access_key),
            ("secret-key", &self.secret_key),
            ("user-caps", &self.user_caps),
        ];
        let mut pairs: Vec<(&'static str, String)> = strings
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k, v.clone()))
            .collect();

        if self.generate_key {
            pairs.push(("generate-key", "true".to_string()));
        }
        if self.suspended != 0 {
            pairs.push(("suspended", self.suspended.to_string()));
        }
        if self.max_buckets != 0 {
            pairs.push(("max-buckets", self.max_buckets.to_string()));
        }
        if !self.tenant.is_empty() {
            pairs.push(("tenant", self.tenant.clone()));
        }
        if self.system {
            pairs.push(("system", "true".to_string()));
        }
        if !self.op_mask.is_empty() {
            pairs.push(("op-mask", self.op_mask.clone()));
        }

        pairs
    }

    /// Percent-encoded query string of the non-empty fields.
    pub fn to_query(&self) -> String {
        encode_query(self.query_pairs().iter().map(|(k, v)| (*k, v.as_str())))
    }
}

fn encode_query<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuotaType {
    User,
    Bucket,
}

impl QuotaType {
    fn as_str(self) -> &'static str {
        match self {
            QuotaType::User => "user",
            QuotaType::Bucket => "bucket",
        }
    }
}

fn user_quota_path(uid: &str, quota_type: QuotaType) -> String {
    format!(
        "/admin/user?quota&{}",
        encode_query([("uid", uid), ("quota-type", quota_type.as_str())])
    )
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid_argument(message));
    }
    Ok(())
}

impl RgwClient {
    async fn put_quota(&self, path: &str, quota: &Quota) -> Result<()> {
        let builder = self
            .client
            .request(Method::PUT, path)?
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(quota)?);
        self.client.send_checked(builder).await?;
        Ok(())
    }

    pub async fn put_user_quota(&self, uid: &str, quota: &Quota) -> Result<()> {
        require(uid, "uid is required")?;
        self.put_quota(&user_quota_path(uid, QuotaType::User), quota).await?;

        info!(
            uid = uid,
            max_size = quota.max_size,
            max_objects = quota.max_objects,
            "user quota set."
        );
        Ok(())
    }

    /// Quota applied to each bucket owned by `uid`.
    pub async fn put_user_bucket_quota(&self, uid: &str, quota: &Quota) -> Result<()> {
        require(uid, "uid is required")?;
        self.put_quota(&user_quota_path(uid, QuotaType::Bucket), quota).await?;

        info!(
            uid = uid,
            max_size = quota.max_size,
            max_objects = quota.max_objects,
            "user bucket quota set."
        );
        Ok(())
    }

    pub async fn put_bucket_quota(&self, uid: &str, bucket: &str, quota: &Quota) -> Result<()> {
        require(uid, "uid is required")?;
        require(bucket, "bucket is required")?;

        let path = format!(
            "/admin/bucket?quota&{}",
            encode_query([("uid", uid), ("bucket", bucket)])
        );
        self.put_quota(&path, quota).await?;

        info!(uid = uid, bucket = bucket, "bucket quota set.");
        Ok(())
    }

    pub async fn get_user_quota(&self, uid: &str) -> Result<Quota> {
        require(uid, "uid is required")?;
        let builder = self
            .client
            .request(Method::GET, &user_quota_path(uid, QuotaType::User))?;
        self.send_json(builder).await
    }

    pub async fn get_user_bucket_quota(&self, uid: &str) -> Result<Quota> {
        require(uid, "uid is required")?;
        let builder = self
            .client
            .request(Method::GET, &user_quota_path(uid, QuotaType::Bucket))?;
        self.send_json(builder).await
    }

    /// Bucket metadata, usage and quota.
    pub async fn get_bucket_info(&self, uid: &str, bucket: &str) -> Result<Vec<BucketInfoElement>> {
        let path = format!(
            "/admin/bucket?{}",
            encode_query([("uid", uid), ("bucket", bucket), ("stats", "True")])
        );
        let builder = self.client.request(Method::GET, &path)?;
        self.send_json(builder).await
    }

    pub async fn get_user_info(&self, uid: &str, stats: bool) -> Result<UserInfo> {
        require(uid, "uid is required")?;

        let stats = if stats { "True" } else { "False" };
        let path = format!(
            "/admin/user?{}",
            encode_query([("uid", uid), ("stats", stats)])
        );
        let builder = self.client.request(Method::GET, &path)?;
        self.send_json(builder).await
    }

    pub async fn create_user(&self, user: &UserConf) -> Result<UserInfo> {
        require(&user.uid, "uid is required")?;
        require(&user.display_name, "display-name is required")?;

        let builder = self
            .client
            .request(Method::PUT, &format!("/admin/user?{}", user.to_query()))?;
        let user_info: UserInfo = self.send_json(builder).await?;

        info!(uid = user.uid, "user created.");
        Ok(user_info)
    }

    pub async fn modify_user(&self, user: &UserConf) -> Result<UserInfo> {
        require(&user.uid, "uid is required")?;

        let builder = self
            .client
            .request(Method::POST, &format!("/admin/user?{}", user.to_query()))?;
        let user_info: UserInfo = self.send_json(builder).await?;

        info!(uid = user.uid, "user modified.");
        Ok(user_info)
    }

    pub async fn remove_user(&self, uid: &str) -> Result<()> {
        require(uid, "uid is required")?;

        let path = format!("/admin/user?{}", encode_query([("uid", uid)]));
        let builder = self.client.request(Method::DELETE, &path)?;
        self.client.send_checked(builder).await?;

        info!(uid = uid, "user removed.");
        Ok(())
    }

    /// Create or generate a key for `user.uid`. Returns every key the user
    /// now holds.
    pub async fn create_key(&self, user: &UserConf) -> Result<Vec<KeyClass>> {
        require(&user.uid, "uid is required")?;

        let builder = self
            .client
            .request(Method::PUT, &format!("/admin/user?key&{}", user.to_query()))?;
        self.send_json(builder).await
    }

    pub async fn remove_key(&self, user: &UserConf) -> Result<()> {
        require(&user.access_key, "access-key is required")?;

        let builder = self
            .client
            .request(Method::DELETE, &format!("/admin/user?key&{}", user.to_query()))?;
        self.client.send_checked(builder).await?;

        info!(uid = user.uid, "key removed.");
        Ok(())
    }

    /// `caps` uses the admin syntax, e.g. `users=read;buckets=*`.
    pub async fn add_caps(&self, uid: &str, caps: &str) -> Result<Vec<Capability>> {
        self.modify_caps(Method::PUT, uid, caps).await
    }

    pub async fn remove_caps(&self, uid: &str, caps: &str) -> Result<Vec<Capability>> {
        self.modify_caps(Method::DELETE, uid, caps).await
    }

    async fn modify_caps(&self, method: Method, uid: &str, caps: &str) -> Result<Vec<Capability>> {
        require(uid, "uid is required")?;

        let path = format!(
            "/admin/user?caps&{}",
            encode_query([("uid", uid), ("user-caps", caps)])
        );
        let builder = self.client.request(method, &path)?;
        self.send_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_conf_omits_empty_fields() {
        let user = UserConf {
            uid: "u1".to_string(),
            display_name: "User One".to_string(),
            generate_key: true,
            max_buckets: 10,
            ..UserConf::default()
        };

        assert_eq!(
            user.to_query(),
            "uid=u1&display-name=User+One&generate-key=true&max-buckets=10"
        );
        assert_eq!(UserConf::default().to_query(), "");
    }

    #[test]
    fn user_conf_field_order() {
        let user = UserConf {
            uid: "u1".to_string(),
            email: "a@b.c".to_string(),
            key_type: "s3".to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            user_caps: "users=*".to_string(),
            suspended: 1,
            tenant: "t".to_string(),
            system: true,
            op_mask: "read".to_string(),
            ..UserConf::default()
        };

        let keys: Vec<&str> = user.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "uid",
                "email",
                "key-type",
                "access-key",
                "secret-key",
                "user-caps",
                "suspended",
                "tenant",
                "system",
                "op-mask"
            ]
        );
        assert!(user.to_query().contains("user-caps=users%3D*"));
    }

    #[test]
    fn quota_paths() {
        assert_eq!(
            user_quota_path("u1", QuotaType::User),
            "/admin/user?quota&uid=u1&quota-type=user"
        );
        assert_eq!(
            user_quota_path("u1", QuotaType::Bucket),
            "/admin/user?quota&uid=u1&quota-type=bucket"
        );
    }

    #[test]
    fn user_info_parses_partial_document() {
        let body = r#"{
            "user_id": "u1",
            "display_name": "User One",
            "max_buckets": 1000,
            "keys": [{"user": "u1", "access_key": "ak", "secret_key": "sk"}],
            "caps": [{"type": "users", "perm": "*"}],
            "user_quota": {"enabled": true, "max_size": -1, "max_objects": 100},
            "type": "rgw",
            "unknown_field": 1
        }"#;

        let user: UserInfo = serde_json::from_str(body).unwrap();

        assert_eq!(user.user_id, "u1");
        assert_eq!(user.keys[0].access_key, "ak");
        assert_eq!(
            user.caps,
            vec![Capability {
                cap_type: "users".to_string(),
                perm: "*".to_string()
            }]
        );
        assert!(user.user_quota.enabled);
        assert_eq!(user.user_quota.max_objects, 100);
        assert_eq!(user.user_type, "rgw");
        assert_eq!(user.bucket_quota, Quota::default());
    }

    #[test]
    fn bucket_info_reads_main_usage() {
        let body = r#"[{
            "bucket": "b1",
            "num_shards": 11,
            "owner": "u1",
            "usage": {"rgw.main": {"size": 2048, "num_objects": 2}},
            "bucket_quota": {"enabled": false, "max_size": -1}
        }]"#;

        let info: Vec<BucketInfoElement> = serde_json::from_str(body).unwrap();

        assert_eq!(info.len(), 1);
        assert_eq!(info[0].usage.rgw_main.size, 2048);
        assert_eq!(info[0].usage.rgw_main.num_objects, 2);
        assert_eq!(info[0].bucket_quota.max_size, -1);
    }

    #[test]
    fn quota_serializes_all_fields() {
        let quota = Quota {
            enabled: true,
            max_objects: 10,
            ..Quota::default()
        };

        assert_eq!(
            serde_json::to_string(&quota).unwrap(),
            r#"{"enabled":true,"check_on_raw":false,"max_size":0,"max_size_kb":0,"max_objects":10}"#
        );
    }
}
