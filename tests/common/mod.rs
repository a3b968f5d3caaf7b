//! Shared helpers for the Web API integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use groupvault::db::{NewUser, Role, UserRepository};
use groupvault::file::FileStorage;
use groupvault::web::handlers::AppState;
use groupvault::web::middleware::{JwtState, RateLimitState};
use groupvault::web::router::create_router;
use groupvault::{hash_password, Database};

pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "adminpass123";
pub const USER_PASSWORD: &str = "password123";

/// A router over an in-memory database and a temporary blob directory.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub storage_dir: TempDir,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_rate_limit(1000).await
}

pub async fn create_test_app_with_rate_limit(login_rate_limit: u32) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
    let storage = FileStorage::new(storage_dir.path()).expect("Failed to create storage");

    let app_state = Arc::new(AppState::new(db.clone(), storage, JWT_SECRET, 900, 7));
    let jwt_state = Arc::new(JwtState::new(JWT_SECRET));
    let rate_limit_state = Arc::new(RateLimitState::new(login_rate_limit));

    let router = create_router(app_state, jwt_state, rate_limit_state, &[]);
    let server = TestServer::new(router).expect("Failed to create test server");

    create_admin(&db).await;

    TestApp {
        server,
        db,
        storage_dir,
    }
}

/// Insert the administrator account directly.
async fn create_admin(db: &Database) {
    let hash = hash_password(ADMIN_PASSWORD).expect("Failed to hash password");
    UserRepository::new(db.pool())
        .create(&NewUser::new(ADMIN_USERNAME, hash, "Administrator").with_role(Role::Admin))
        .await
        .expect("Failed to create admin");
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub async fn login(server: &TestServer, username: &str, password: &str) -> TestResponse {
    server
        .post("/api/auth/login")
        .json(&json!({ "username": username, "password": password }))
        .await
}

pub async fn admin_token(server: &TestServer) -> String {
    let response = login(server, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    response.assert_status_ok();
    access_token(&response.json::<Value>())
}

/// Register a regular user and return `(user_id, access_token)`.
pub async fn register_user(server: &TestServer, username: &str) -> (i64, String) {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "username": username,
            "password": USER_PASSWORD,
            "display_name": username,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    (
        body["data"]["user"]["id"].as_i64().unwrap(),
        access_token(&body),
    )
}

pub fn access_token(body: &Value) -> String {
    body["data"]["access_token"].as_str().unwrap().to_string()
}

/// Create a group as admin and return its id.
pub async fn create_group(
    server: &TestServer,
    admin: &str,
    name: &str,
    storage_limit: Option<i64>,
) -> i64 {
    let response = server
        .post("/api/groups")
        .add_header(AUTHORIZATION, bearer(admin))
        .json(&json!({ "name": name, "storage_limit": storage_limit }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}

pub async fn add_member(server: &TestServer, admin: &str, group_id: i64, user_id: i64) {
    let response = server
        .post(&format!("/api/groups/{}/users", group_id))
        .add_header(AUTHORIZATION, bearer(admin))
        .json(&json!({ "user_id": user_id }))
        .await;
    assert!(response.status_code().is_success());
}

pub async fn update_settings(server: &TestServer, admin: &str, settings: Value) {
    server
        .put("/api/settings")
        .add_header(AUTHORIZATION, bearer(admin))
        .json(&settings)
        .await
        .assert_status_ok();
}

pub async fn upload(
    server: &TestServer,
    token: &str,
    group_id: i64,
    name: &str,
    content: Vec<u8>,
) -> TestResponse {
    let form = MultipartForm::new()
        .add_text("group_id", group_id.to_string())
        .add_part("file", Part::bytes(content).file_name(name.to_string()));

    server
        .post("/api/files")
        .add_header(AUTHORIZATION, bearer(token))
        .multipart(form)
        .await
}

/// Upload and return the new file id, asserting success.
pub async fn upload_ok(
    server: &TestServer,
    token: &str,
    group_id: i64,
    name: &str,
    content: Vec<u8>,
) -> i64 {
    let response = upload(server, token, group_id, name, content).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}

/// Build an in-memory ZIP archive from `(name, content)` pairs.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn error_message(body: &Value) -> String {
    body["error"]["message"].as_str().unwrap_or("").to_string()
}

/// Number of blobs on disk, walking the shard directories.
pub fn blob_count(app: &TestApp) -> usize {
    fn walk(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path)
                } else {
                    1
                }
            })
            .sum()
    }
    walk(app.storage_dir.path())
}
