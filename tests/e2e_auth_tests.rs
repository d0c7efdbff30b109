//! End-to-end tests for token authentication
//!
//! Tests login, logout, token expiry and authentication requirements.

mod common;

use common::{error_code, TestClient, TestServer, OTHER_PASS, OTHER_USER, TEST_PASS, TEST_USER};
use reqwest::{header, StatusCode};
use serde_json::Value;

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(TEST_USER, TEST_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("no session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user_id"], server.seeded.test_user_id.as_str());
    assert_eq!(body["access_token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_login_with_invalid_password() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(TEST_USER, "wrong_password").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "invalid_credentials");
}

#[tokio::test]
async fn test_login_with_nonexistent_user() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login("nonexistent_user", "password").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "invalid_credentials");
}

#[tokio::test]
async fn test_protected_endpoint_requires_authentication() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get("/artists").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "invalid_token");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let server = TestServer::spawn().await;
    let mut client = TestClient::new(server.base_url.clone());
    client.token = Some("x".repeat(64));

    let response = client.get("/songs").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "invalid_token");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.get("/artists").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get("/artists").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_keeps_other_sessions() {
    let server = TestServer::spawn().await;
    let first = TestClient::authenticated(server.base_url.clone()).await;
    let second = TestClient::authenticated(server.base_url.clone()).await;

    first.logout().await;

    assert_eq!(second.get("/artists").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let server = TestServer::spawn_with(
        |config| pezzottify_library::ServerConfig {
            token_ttl_sec: 1,
            ..config
        },
        None,
    )
    .await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    assert_eq!(client.get("/artists").await.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let response = client.get("/artists").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "invalid_token");
}

#[tokio::test]
async fn test_health_is_public() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_library_client_reports_user_id() {
    let server = TestServer::spawn().await;
    let client = server.library_client().await;
    assert_eq!(client.user_id(), None);

    let user_id = client.login().await.unwrap();

    assert_eq!(user_id, server.seeded.test_user_id);
    assert_eq!(client.user_id(), Some(server.seeded.test_user_id.clone()));
}

#[tokio::test]
async fn test_each_user_logs_in_with_own_password() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(
        client.login(OTHER_USER, OTHER_PASS).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        client.login(OTHER_USER, TEST_PASS).await.status(),
        StatusCode::UNAUTHORIZED
    );
}
