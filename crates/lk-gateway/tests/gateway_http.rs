//! Gateway client tests against a mock backend

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lk_core::config::BackendConfig;
use lk_core::error::GatewayError;
use lk_core::traits::BackendGateway;
use lk_core::types::{ResourceId, UserId};
use lk_gateway::HttpBackendGateway;

const TOKEN: &str = "test-token";

fn gateway_for(server: &MockServer) -> HttpBackendGateway {
    gateway_with_timeout(server, None)
}

fn gateway_with_timeout(server: &MockServer, timeout: Option<Duration>) -> HttpBackendGateway {
    HttpBackendGateway::from_config(&BackendConfig {
        url: Some(server.uri()),
        token: Some(TOKEN.to_string()),
        request_timeout: timeout,
    })
    .expect("valid backend config")
}

#[tokio::test]
async fn test_delete_resource_sends_bearer_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labs/delete"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({ "lab_request_id": "vm-1", "user_id": "u1" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway_for(&server)
        .delete_resource(&ResourceId::new("vm-1"), &UserId::new("u1"))
        .await
        .expect("deletion succeeds");

    assert_eq!(ack.status, 200);
    assert!(!ack.is_async());
}

#[tokio::test]
async fn test_delete_resource_accepted_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labs/delete"))
        .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
        .mount(&server)
        .await;

    let ack = gateway_for(&server)
        .delete_resource(&ResourceId::new("vm-1"), &UserId::new("u1"))
        .await
        .expect("202 counts as success");

    assert!(ack.is_async());
}

#[tokio::test]
async fn test_delete_resource_failure_captures_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labs/delete"))
        .respond_with(ResponseTemplate::new(500).set_body_string("hypervisor unavailable"))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .delete_resource(&ResourceId::new("vm-1"), &UserId::new("u1"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GatewayError::Status {
            status: 500,
            body: "hypervisor unavailable".to_string(),
        }
    );
}

#[tokio::test]
async fn test_delete_resource_not_found_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labs/delete"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .delete_resource(&ResourceId::new("vm-1"), &UserId::new("u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_delete_exposed_services_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/expose/"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({ "lab_request_id": "vm-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"deleted":2}"#))
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway_for(&server)
        .delete_exposed_services(&ResourceId::new("vm-1"))
        .await
        .expect("service deletion succeeds");

    assert_eq!(ack.status, 200);
    assert_eq!(ack.body, r#"{"deleted":2}"#);
}

#[tokio::test]
async fn test_delete_exposed_services_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/expose/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .delete_exposed_services(&ResourceId::new("vm-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_request_timeout_maps_to_timeout_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/labs/delete"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = gateway_with_timeout(&server, Some(Duration::from_millis(100)))
        .delete_resource(&ResourceId::new("vm-1"), &UserId::new("u1"))
        .await
        .unwrap_err();

    assert_eq!(err, GatewayError::Timeout);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let gateway = HttpBackendGateway::from_config(&BackendConfig {
        url: Some("http://127.0.0.1:1".to_string()),
        token: Some(TOKEN.to_string()),
        request_timeout: Some(Duration::from_secs(5)),
    })
    .unwrap();

    let err = gateway
        .delete_resource(&ResourceId::new("vm-1"), &UserId::new("u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
}
