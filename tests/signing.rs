//! V2 signatures as they appear on the wire.

mod common;

use common::*;
use common::gateway::RecordedRequest;
use reqwest::Method;
use rgwbox_rs::auth::sigv2::compute_signature;
use rgwbox_rs::auth::CredentialsProvider;
use rgwbox_rs::types::AccessKeys;
use rgwbox_rs::types::error::{RgwboxError, is_credential_error};
use rgwbox_rs::{SignerV2, StorageClient};

fn expected_authorization(request: &RecordedRequest, verb: &str, resource: &str) -> String {
    let date = request.header("date").unwrap();
    let string_to_sign = format!("{verb}\n\n\n{date}\n{resource}");
    format!(
        "AWS {ACCESS_KEY}:{}",
        compute_signature(SECRET_KEY, &string_to_sign).unwrap()
    )
}

#[tokio::test]
async fn listing_request_signs_sub_resource_only() {
    init_dummy_tracing_subscriber();

    let gateway = FakeGateway::start().await;
    gateway.mount(
        Route::new("GET")
            .path("/b1")
            .reply(versions_body("b1", &[], &[])),
    );

    let client = client(&gateway);
    let builder = client
        .request(Method::GET, "/b1?versions&max-keys=1000&key-marker=k")
        .unwrap();
    client.send_checked(builder).await.unwrap();

    let request = &gateway.requests()[0];
    assert_eq!(
        request.header("authorization").unwrap(),
        expected_authorization(request, "GET", "/b1?versions")
    );
}

#[tokio::test]
async fn content_headers_are_signed() {
    init_dummy_tracing_subscriber();

    let gateway = FakeGateway::start().await;
    gateway.mount(Route::new("PUT").path("/b1"));

    let client = client(&gateway);
    let builder = client
        .request(Method::PUT, "/b1?tagging")
        .unwrap()
        .header("Content-Type", "application/xml")
        .header("Content-MD5", "1B2M2Y8AsgTpgAmY7PhCfg==")
        .header("x-amz-meta-Owner", "  a   b ")
        .body("<Tagging/>");
    client.send_checked(builder).await.unwrap();

    let request = &gateway.requests()[0];
    let date = request.header("date").unwrap();
    let string_to_sign = format!(
        "PUT\n1B2M2Y8AsgTpgAmY7PhCfg==\napplication/xml\n{date}\nx-amz-meta-owner:a b\n/b1?tagging"
    );
    assert_eq!(
        request.header("authorization").unwrap(),
        format!(
            "AWS {ACCESS_KEY}:{}",
            compute_signature(SECRET_KEY, &string_to_sign).unwrap()
        )
    );
}

#[tokio::test]
async fn session_token_is_sent_and_signed() {
    init_dummy_tracing_subscriber();

    let gateway = FakeGateway::start().await;
    gateway.mount(Route::new("GET").reply(list_buckets_body(&[])));

    let mut access_keys = AccessKeys::new(ACCESS_KEY, SECRET_KEY);
    access_keys.session_token = Some("tok".to_string());
    let signer = SignerV2::new(CredentialsProvider::Static(access_keys), false);
    let client = StorageClient::new(&gateway.uri(), signer, reqwest::Client::new());
    client
        .send_checked(client.request(Method::GET, "/").unwrap())
        .await
        .unwrap();

    let request = &gateway.requests()[0];
    let date = request.header("date").unwrap();
    assert_eq!(
        request.header("x-amz-security-token").as_deref(),
        Some("tok")
    );
    let string_to_sign = format!("GET\n\n\n{date}\nx-amz-security-token:tok\n/");
    assert_eq!(
        request.header("authorization").unwrap(),
        format!(
            "AWS {ACCESS_KEY}:{}",
            compute_signature(SECRET_KEY, &string_to_sign).unwrap()
        )
    );
}

#[tokio::test]
async fn empty_keys_fail_before_sending() {
    init_dummy_tracing_subscriber();

    let gateway = FakeGateway::start().await;
    let signer = SignerV2::new(CredentialsProvider::Static(AccessKeys::new("", "")), false);
    let client = StorageClient::new(&gateway.uri(), signer, reqwest::Client::new());

    let e = client
        .send(client.request(Method::GET, "/").unwrap())
        .await
        .unwrap_err();

    assert!(is_credential_error(&e));
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn error_document_becomes_service_error() {
    init_dummy_tracing_subscriber();

    let gateway = FakeGateway::start().await;
    gateway.mount(
        Route::new("GET")
            .status(404)
            .reply(error_body("NoSuchBucket", "missing")),
    );

    let client = client(&gateway);
    let raw = client
        .send(client.request(Method::GET, "/b1").unwrap())
        .await
        .unwrap();
    assert_eq!(raw.status().as_u16(), 404);

    let e = client
        .send_checked(client.request(Method::GET, "/b1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(
        e.downcast_ref::<RgwboxError>(),
        Some(&RgwboxError::service(404, "NoSuchBucket", "missing"))
    );
}
