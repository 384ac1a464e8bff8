// ABOUTME: Integration tests for the auth provider against a mock HTTP server

use hubshell::error::ShellError;
use hubshell::hub::Hub;
use hubshell::providers::{AuthConfig, AuthProvider};
use hubshell::services::{AuthService, LoginOutcome};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn provider(server: &MockServer) -> (Hub, Arc<AuthProvider>) {
    let hub = Hub::new();
    let auth = AuthProvider::configure(
        &hub,
        &AuthConfig {
            server: server.uri(),
            root: "/monitor/terminal".to_string(),
        },
    )
    .unwrap();
    (hub, auth)
}

#[tokio::test]
async fn test_login_success_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/login"))
        .and(body_json(json!({"user": "admin", "pass": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("t0k3n"))
        .expect(1)
        .mount(&server)
        .await;

    let (_hub, auth) = provider(&server).await;
    let outcome = auth.login("admin", "secret").await;

    assert_eq!(
        outcome,
        LoginOutcome::Authenticated {
            token: "t0k3n".to_string()
        }
    );
    assert!(auth.is_logged());
}

#[tokio::test]
async fn test_login_rejected_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (_hub, auth) = provider(&server).await;
    let outcome = auth.login("admin", "wrong").await;

    assert_eq!(
        outcome,
        LoginOutcome::Rejected {
            status: Some(401),
            error: "Unauthorized".to_string()
        }
    );
    assert!(!auth.is_logged());
}

#[tokio::test]
async fn test_other_success_codes_are_not_a_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/login"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (_hub, auth) = provider(&server).await;
    let outcome = auth.login("admin", "secret").await;

    assert_eq!(
        outcome,
        LoginOutcome::Rejected {
            status: Some(204),
            error: "No Content".to_string()
        }
    );
    assert!(!auth.is_logged());
}

#[tokio::test]
async fn test_unreachable_server_is_a_rejection() {
    let hub = Hub::new();
    let auth = AuthProvider::configure(
        &hub,
        &AuthConfig {
            server: "http://127.0.0.1:9".to_string(),
            root: "/monitor".to_string(),
        },
    )
    .unwrap();

    let outcome = auth.login("admin", "secret").await;
    assert!(matches!(outcome, LoginOutcome::Rejected { status: None, .. }));
}

#[tokio::test]
async fn test_logout_resets_even_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("t"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/monitor/terminal/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (_hub, auth) = provider(&server).await;
    auth.login("admin", "secret").await;
    assert!(auth.is_logged());

    auth.logout().await;
    assert!(!auth.is_logged());
}

#[tokio::test]
async fn test_registration_and_stop() {
    let server = MockServer::start().await;
    let (hub, auth) = provider(&server).await;

    let reference = hub.get_service::<dyn AuthService>().unwrap();
    assert_eq!(reference.properties["root"], json!("/monitor/terminal"));

    auth.stop();
    assert!(hub.get_service::<dyn AuthService>().is_none());
}

#[test]
fn test_invalid_root_is_rejected() {
    let hub = Hub::new();
    let result = AuthProvider::configure(
        &hub,
        &AuthConfig {
            server: "http://localhost:9000".to_string(),
            root: "monitor/".to_string(),
        },
    );

    assert!(matches!(
        result.err(),
        Some(ShellError::InvalidPath { field: "root", .. })
    ));
    assert!(hub.get_service::<dyn AuthService>().is_none());
}
