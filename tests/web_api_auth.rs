//! Web API Auth Tests
//!
//! Registration, login, token rotation, logout and the current-user view.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use serde_json::{json, Value};

use common::*;

#[tokio::test]
async fn test_register_success() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice",
            "password": "password123",
            "display_name": "Alice",
            "email": "alice@example.com"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert!(body["data"]["access_token"].is_string());
    assert!(body["data"]["refresh_token"].is_string());
    assert_eq!(body["data"]["expires_in"], 900);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(body["data"]["user"]["role"], "regular");
    assert!(body["data"]["user"].get("password").is_none());
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = create_test_app().await;
    register_user(&app.server, "alice").await;

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice",
            "password": "password123",
            "display_name": "Another Alice"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let app = create_test_app().await;

    let short_password = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice",
            "password": "short",
            "display_name": "Alice"
        }))
        .await;
    short_password.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = short_password.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let bad_username = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "al ice",
            "password": "password123",
            "display_name": "Alice"
        }))
        .await;
    bad_username.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let bad_json = app
        .server
        .post("/api/auth/register")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    bad_json.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let app = create_test_app().await;
    register_user(&app.server, "alice").await;

    let response = login(&app.server, "alice", USER_PASSWORD).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["user"]["username"], "alice");

    let wrong_password = login(&app.server, "alice", "wrongpassword").await;
    wrong_password.assert_status(StatusCode::UNAUTHORIZED);

    let unknown_user = login(&app.server, "nobody", "password123").await;
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);

    // Both failures look the same to the client.
    assert_eq!(
        error_message(&wrong_password.json::<Value>()),
        error_message(&unknown_user.json::<Value>())
    );
}

#[tokio::test]
async fn test_login_rate_limited() {
    let app = create_test_app_with_rate_limit(2).await;

    login(&app.server, "nobody", "password123")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    login(&app.server, "nobody", "password123")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = login(&app.server, "nobody", "password123").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");
}

#[tokio::test]
async fn test_me_requires_auth() {
    let app = create_test_app().await;

    app.server
        .get("/api/auth/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, "Bearer not-a-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reports_groups_and_quota() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, token) = register_user(&app.server, "alice").await;
    let group_id = create_group(&app.server, &admin, "Team", None).await;
    add_member(&app.server, &admin, group_id, user_id).await;

    upload_ok(&app.server, &token, group_id, "notes.txt", vec![b'a'; 1500]).await;

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["id"], user_id);
    assert_eq!(body["data"]["groups"][0]["name"], "Team");
    assert_eq!(body["data"]["quota"]["used_bytes"], 1500);
    assert_eq!(body["data"]["quota"]["limit_bytes"], 10 * 1024 * 1024);
    assert_eq!(body["data"]["quota"]["source"], "default");
}

#[tokio::test]
async fn test_token_in_query_string() {
    let app = create_test_app().await;
    let (_, token) = register_user(&app.server, "alice").await;

    app.server
        .get(&format!("/api/auth/me?token={}", token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = create_test_app().await;
    register_user(&app.server, "alice").await;

    let body: Value = login(&app.server, "alice", USER_PASSWORD).await.json();
    let refresh_token = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await;
    response.assert_status_ok();
    let rotated: Value = response.json();
    let new_refresh = rotated["data"]["refresh_token"].as_str().unwrap();
    assert_ne!(new_refresh, refresh_token);
    assert!(rotated["data"]["access_token"].is_string());

    // The old token is spent.
    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": new_refresh }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = create_test_app().await;
    register_user(&app.server, "alice").await;

    let body: Value = login(&app.server, "alice", USER_PASSWORD).await.json();
    let token = access_token(&body);
    let refresh_token = body["data"]["refresh_token"].as_str().unwrap().to_string();

    app.server
        .post("/api/auth/logout")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "refresh_token": refresh_token }))
        .await
        .assert_status_ok();

    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_cannot_revoke_other_users_token() {
    let app = create_test_app().await;
    register_user(&app.server, "alice").await;
    let (_, bob_token) = register_user(&app.server, "bob").await;

    let body: Value = login(&app.server, "alice", USER_PASSWORD).await.json();
    let alice_refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    app.server
        .post("/api/auth/logout")
        .add_header(AUTHORIZATION, bearer(&bob_token))
        .json(&json!({ "refresh_token": alice_refresh }))
        .await
        .assert_status_ok();

    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": alice_refresh }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = create_test_app().await;

    let response = app.server.get("/api/auth/me").await;
    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
}
