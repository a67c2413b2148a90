mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use common::*;
use sigel_auth::AppResources;
use sigel_auth::entity::{oauth2_client, user};
use std::collections::HashMap;

fn forwarded_for() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
    )
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("header value")
}

fn location_query(response: &axum_test::TestResponse) -> HashMap<String, String> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .expect("ascii Location");
    let url = url::Url::parse(location).expect("absolute Location");
    url.query_pairs().into_owned().collect()
}

async fn server_with_user() -> (TestServer, AppResources, user::Model, oauth2_client::Model) {
    let resources = setup().await;
    let root = create_superuser(&resources).await;
    let alice = create_user(&resources, &root, "alice@example.org").await;
    let sfx = create_collection(&resources, &root, "SfX").await;
    grant(&resources, &root, &alice, &sfx, cataloger()).await;
    let client = create_client(&resources, &root, true).await;

    let server = TestServer::new(sigel_auth::api::app(&resources)).expect("create test server");
    (server, resources, alice, client)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let resources = setup().await;
    let server = TestServer::new(sigel_auth::api::app(&resources)).expect("create test server");

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_server_metadata_uses_issuer_url() {
    let resources = setup().await;
    let server = TestServer::new(sigel_auth::api::app(&resources)).expect("create test server");

    let response = server
        .get("/oauth2/.well-known/oauth-authorization-server")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["issuer"], "http://localhost:8080");
    assert_eq!(body["token_endpoint"], "http://localhost:8080/oauth2/token");
    assert_eq!(body["code_challenge_methods_supported"][0], "S256");
}

// =============================================================================
// Full flow
// =============================================================================

#[tokio::test]
async fn test_authorize_token_verify_revoke() {
    let (server, _resources, alice, client) = server_with_user().await;
    let (xff_name, xff_value) = forwarded_for();

    let response = server
        .post("/oauth2/authorize")
        .add_header(xff_name, xff_value)
        .form(&[
            ("response_type", "code"),
            ("client_id", client.id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("state", "xyz"),
            ("email", "alice@example.org"),
            ("password", PASSWORD),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let query = location_query(&response);
    assert_eq!(query.get("state").map(String::as_str), Some("xyz"));
    let code = query.get("code").expect("code in redirect").clone();

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", client.id.as_str()),
            ("client_secret", client.secret.as_str()),
        ])
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL),
        Some(&HeaderValue::from_static("no-store"))
    );
    let body: serde_json::Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "read write");
    assert!(body["expires_in"].as_i64().unwrap() > 0);
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert!(body["refresh_token"].is_string());

    let response = server
        .get("/oauth2/verify")
        .add_header(header::AUTHORIZATION, bearer(&access_token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user"]["email"], alice.email.as_str());
    assert_eq!(body["user"]["permissions"][0]["code"], "SfX");
    assert_eq!(body["user"]["permissions"][0]["cataloger"], true);
    assert_eq!(body["user"]["permissions"][0]["registrant"], false);
    assert!(body["expires_at"].is_string());

    let response = server
        .post("/oauth2/revoke")
        .form(&[
            ("token", access_token.as_str()),
            ("client_id", client.id.as_str()),
            ("client_secret", client.secret.as_str()),
        ])
        .await;
    response.assert_status_ok();

    let response = server
        .get("/oauth2/verify")
        .add_header(header::AUTHORIZATION, bearer(&access_token))
        .await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_token");
}

// =============================================================================
// Authorization endpoint errors
// =============================================================================

#[tokio::test]
async fn test_authorize_unknown_client_is_not_redirected() {
    let (server, _resources, _alice, _client) = server_with_user().await;

    let response = server
        .post("/oauth2/authorize")
        .form(&[
            ("response_type", "code"),
            ("client_id", "no-such-client"),
            ("email", "alice@example.org"),
            ("password", PASSWORD),
        ])
        .await;

    response.assert_status_unauthorized();
    assert!(response.headers().get(header::LOCATION).is_none());
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_authorize_unregistered_redirect_is_not_followed() {
    let (server, _resources, _alice, client) = server_with_user().await;

    let response = server
        .post("/oauth2/authorize")
        .form(&[
            ("response_type", "code"),
            ("client_id", client.id.as_str()),
            ("redirect_uri", "https://evil.example/cb"),
            ("email", "alice@example.org"),
            ("password", PASSWORD),
        ])
        .await;

    response.assert_status_bad_request();
    assert!(response.headers().get(header::LOCATION).is_none());
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorize_bad_password_redirects_with_error() {
    let (server, _resources, _alice, client) = server_with_user().await;
    let (xff_name, xff_value) = forwarded_for();

    let response = server
        .post("/oauth2/authorize")
        .add_header(xff_name, xff_value)
        .form(&[
            ("response_type", "code"),
            ("client_id", client.id.as_str()),
            ("state", "abc"),
            ("email", "alice@example.org"),
            ("password", "not the password"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let query = location_query(&response);
    assert_eq!(query.get("error").map(String::as_str), Some("access_denied"));
    assert_eq!(query.get("state").map(String::as_str), Some("abc"));
    assert!(!query.contains_key("code"));
}

#[tokio::test]
async fn test_authorize_unsupported_response_type() {
    let (server, _resources, _alice, client) = server_with_user().await;

    let response = server
        .post("/oauth2/authorize")
        .form(&[
            ("response_type", "token"),
            ("client_id", client.id.as_str()),
            ("email", "alice@example.org"),
            ("password", PASSWORD),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let query = location_query(&response);
    assert_eq!(
        query.get("error").map(String::as_str),
        Some("unsupported_response_type")
    );
}

// =============================================================================
// Token and verify endpoint errors
// =============================================================================

#[tokio::test]
async fn test_token_missing_client_id() {
    let (server, _resources, _alice, _client) = server_with_user().await;

    let response = server
        .post("/oauth2/token")
        .form(&[("grant_type", "authorization_code"), ("code", "test-code")])
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_token_wrong_secret() {
    let (server, _resources, _alice, client) = server_with_user().await;

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", "test-code"),
            ("client_id", client.id.as_str()),
            ("client_secret", "wrong"),
        ])
        .await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_token_unsupported_grant_type() {
    let (server, _resources, _alice, client) = server_with_user().await;

    let response = server
        .post("/oauth2/token")
        .form(&[
            ("grant_type", "password"),
            ("client_id", client.id.as_str()),
            ("client_secret", client.secret.as_str()),
        ])
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_token_unknown_code_and_refresh_token() {
    let (server, _resources, _alice, client) = server_with_user().await;

    for form in [
        [
            ("grant_type", "authorization_code"),
            ("code", "nonexistent-code"),
        ],
        [
            ("grant_type", "refresh_token"),
            ("refresh_token", "nonexistent-token"),
        ],
    ] {
        let response = server
            .post("/oauth2/token")
            .form(&[
                form[0],
                form[1],
                ("client_id", client.id.as_str()),
                ("client_secret", client.secret.as_str()),
            ])
            .await;

        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_grant");
    }
}

#[tokio::test]
async fn test_verify_without_bearer() {
    let (server, _resources, _alice, _client) = server_with_user().await;

    let response = server.get("/oauth2/verify").await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_revoke_unknown_token_is_ok() {
    let (server, _resources, _alice, client) = server_with_user().await;

    let response = server
        .post("/oauth2/revoke")
        .form(&[
            ("token", "nonexistent-token"),
            ("token_type_hint", "access_token"),
            ("client_id", client.id.as_str()),
            ("client_secret", client.secret.as_str()),
        ])
        .await;

    response.assert_status_ok();
}
