//! Raw HTTP client for end-to-end tests
//!
//! Most tests go through `LibraryClient`; this one exists for asserting on
//! status codes, headers and error bodies.

use super::constants::*;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Bearer token, if logged in
    pub token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client logged in as TEST_USER
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        let mut client = Self::new(base_url);

        let response = client.login(TEST_USER, TEST_PASS).await;
        assert_eq!(
            response.status(),
            StatusCode::CREATED,
            "Test user authentication failed"
        );
        let body: Value = response.json().await.unwrap();
        client.token = Some(body["access_token"].as_str().unwrap().to_string());

        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POST /v1/token
    pub async fn login(&self, user_name: &str, password: &str) -> Response {
        self.client
            .post(self.url("/token"))
            .json(&json!({
                "user_name": user_name,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// DELETE /v1/token
    pub async fn logout(&self) -> Response {
        self.authorize(self.client.delete(self.url("/token")))
            .send()
            .await
            .expect("Logout request failed")
    }

    pub async fn get(&self, path: &str) -> Response {
        self.authorize(self.client.get(self.url(path)))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.authorize(self.client.post(self.url(path)))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.authorize(self.client.delete(self.url(path)))
            .send()
            .await
            .expect("DELETE request failed")
    }
}

/// Reads an error body and returns its `error_code`.
pub async fn error_code(response: Response) -> String {
    let body: Value = response.json().await.expect("Error body is not JSON");
    body["error_code"]
        .as_str()
        .expect("Error body has no error_code")
        .to_string()
}
