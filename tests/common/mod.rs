//! Shared infrastructure for tests against a fake gateway.
//!
//! Every test starts its own [`FakeGateway`] on a random local port and
//! talks to it through a statically keyed client (`ak` / `sk`).

#![allow(dead_code)]

pub mod gateway;

pub use gateway::{FakeGateway, Route};

use rgwbox_rs::auth::CredentialsProvider;
use rgwbox_rs::storage::{Storage, create_storage};
use rgwbox_rs::types::AccessKeys;
use rgwbox_rs::{RgwClient, SignerV2, StorageClient};

pub const ACCESS_KEY: &str = "ak";
pub const SECRET_KEY: &str = "sk";

pub fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

pub fn signer() -> SignerV2 {
    SignerV2::new(
        CredentialsProvider::Static(AccessKeys::new(ACCESS_KEY, SECRET_KEY)),
        false,
    )
}

pub fn client(gateway: &FakeGateway) -> StorageClient {
    StorageClient::new(&gateway.uri(), signer(), reqwest::Client::new())
}

pub fn storage(gateway: &FakeGateway) -> Storage {
    create_storage(client(gateway), None)
}

pub fn rgw_client(gateway: &FakeGateway) -> RgwClient {
    RgwClient::new(client(gateway))
}

pub fn list_buckets_body(names: &[&str]) -> String {
    let buckets: String = names
        .iter()
        .map(|name| {
            format!("<Bucket><Name>{name}</Name><CreationDate>2024-01-02T03:04:05.000Z</CreationDate></Bucket>")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Owner><ID>tester</ID></Owner><Buckets>{buckets}</Buckets></ListAllMyBucketsResult>"#
    )
}

/// One untruncated page of `(key, version id)` versions and delete markers.
pub fn versions_body(
    bucket: &str,
    versions: &[(&str, &str)],
    delete_markers: &[(&str, &str)],
) -> String {
    let versions: String = versions
        .iter()
        .map(|(key, version_id)| {
            format!("<Version><Key>{key}</Key><VersionId>{version_id}</VersionId><IsLatest>true</IsLatest><Size>3</Size></Version>")
        })
        .collect();
    let delete_markers: String = delete_markers
        .iter()
        .map(|(key, version_id)| {
            format!("<DeleteMarker><Key>{key}</Key><VersionId>{version_id}</VersionId><IsLatest>true</IsLatest></DeleteMarker>")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListVersionsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{bucket}</Name><Prefix></Prefix><KeyMarker></KeyMarker><VersionIdMarker></VersionIdMarker><MaxKeys>1000</MaxKeys><IsTruncated>false</IsTruncated>{versions}{delete_markers}</ListVersionsResult>"#
    )
}

pub fn uploads_body(bucket: &str, uploads: &[(&str, &str)]) -> String {
    let uploads: String = uploads
        .iter()
        .map(|(key, upload_id)| {
            format!("<Upload><Key>{key}</Key><UploadId>{upload_id}</UploadId></Upload>")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListMultipartUploadsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Bucket>{bucket}</Bucket><MaxUploads>1000</MaxUploads><IsTruncated>false</IsTruncated>{uploads}</ListMultipartUploadsResult>"#
    )
}

pub fn delete_result_body(errors: &[(&str, &str)]) -> String {
    let errors: String = errors
        .iter()
        .map(|(key, code)| {
            format!("<Error><Key>{key}</Key><Code>{code}</Code><Message>failed</Message></Error>")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">{errors}</DeleteResult>"#
    )
}

pub fn error_body(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{code}</Code><Message>{message}</Message><RequestId>tx1</RequestId></Error>"#
    )
}
