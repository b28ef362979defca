//! HTTP platform client tests against a mock API server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crosspost_platform::{
    AccessToken, HttpPlatformClient, MediaAttachment, Platform, PlatformClient, PlatformEndpoints,
    PlatformError, PublishRequest, StaticCredentials,
};

fn request() -> PublishRequest {
    PublishRequest {
        caption: "New drop".to_string(),
        media: vec![MediaAttachment::image("https://cdn.example/1.jpg")],
        hashtags: vec!["art".to_string()],
    }
}

fn client_for(server: &MockServer, platform: Platform) -> HttpPlatformClient {
    let endpoints = PlatformEndpoints::new().with_endpoint(platform, server.uri());
    let credentials =
        StaticCredentials::new().with_token(platform, AccessToken::new("test-token", None));
    HttpPlatformClient::new(endpoints, Arc::new(credentials))
        .with_polling(Duration::from_millis(0), 3)
}

#[tokio::test]
async fn publish_success_returns_external_id_and_permalink() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ig_42",
            "permalink": "https://instagram.com/p/42"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Instagram);
    let post = client.publish(Platform::Instagram, &request()).await.unwrap();

    assert_eq!(post.external_id, "ig_42");
    assert_eq!(post.permalink.as_deref(), Some("https://instagram.com/p/42"));
}

#[tokio::test]
async fn unauthorized_maps_to_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Twitter);
    let err = client
        .publish(Platform::Twitter, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Credential(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Twitter);
    let err = client
        .publish(Platform::Twitter, &request())
        .await
        .unwrap_err();

    match err {
        PlatformError::RateLimited { retry_after_secs } => {
            assert_eq!(retry_after_secs, Some(30));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Facebook);
    let err = client
        .publish(Platform::Facebook, &request())
        .await
        .unwrap_err();

    match err {
        PlatformError::Api {
            platform,
            status,
            message,
        } => {
            assert_eq!(platform, Platform::Facebook);
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Api, got {:?}", other),
    }
}

#[tokio::test]
async fn accepted_post_polls_until_ready() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "processing_id": "proc_7"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/processing/proc_7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ready",
            "id": "ig_99",
            "permalink": "https://instagram.com/p/99"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Instagram);
    let post = client.publish(Platform::Instagram, &request()).await.unwrap();

    assert_eq!(post.external_id, "ig_99");
}

#[tokio::test]
async fn processing_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "processing_id": "proc_slow"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/processing/proc_slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Instagram);
    let err = client
        .publish(Platform::Instagram, &request())
        .await
        .unwrap_err();

    match err {
        PlatformError::Timeout { platform, attempts } => {
            assert_eq!(platform, Platform::Instagram);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_processing_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "processing_id": "proc_bad"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/processing/proc_bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "error": "video transcode failed"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Platform::Instagram);
    let err = client
        .publish(Platform::Instagram, &request())
        .await
        .unwrap_err();

    match err {
        PlatformError::Api { message, .. } => assert_eq!(message, "video transcode failed"),
        other => panic!("expected Api, got {:?}", other),
    }
}

#[tokio::test]
async fn unconfigured_platform_is_rejected_before_any_call() {
    let server = MockServer::start().await;
    // Only Instagram is configured; Twitter must fail without a request.
    let client = client_for(&server, Platform::Instagram);

    let err = client
        .publish(Platform::Twitter, &request())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlatformError::NotConfigured {
            platform: Platform::Twitter
        }
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_token_is_a_credential_error() {
    let server = MockServer::start().await;
    let endpoints = PlatformEndpoints::new().with_endpoint(Platform::Twitter, server.uri());
    let client = HttpPlatformClient::new(endpoints, Arc::new(StaticCredentials::new()));

    let err = client
        .publish(Platform::Twitter, &request())
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Credential(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
