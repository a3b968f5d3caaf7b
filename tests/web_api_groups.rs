//! Web API Group Tests

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use serde_json::{json, Value};

use common::*;

#[tokio::test]
async fn test_create_group() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;

    let response = app
        .server
        .post("/api/groups")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({
            "name": "Design",
            "description": "Design team",
            "storage_limit": 2048
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "Design");
    assert_eq!(body["data"]["description"], "Design team");
    assert_eq!(body["data"]["storage_limit"], 2048);
    assert_eq!(body["data"]["member_count"], 0);
    assert_eq!(body["data"]["used_bytes"], 0);
}

#[tokio::test]
async fn test_create_group_requires_admin() {
    let app = create_test_app().await;
    let (_, token) = register_user(&app.server, "alice").await;

    app.server
        .post("/api/groups")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Design" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_group_duplicate_and_invalid() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    create_group(&app.server, &admin, "Design", None).await;

    app.server
        .post("/api/groups")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "Design" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    app.server
        .post("/api/groups")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "   " }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .post("/api/groups")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "Ops", "storage_limit": -1 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_groups_scoped_to_membership() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, token) = register_user(&app.server, "alice").await;
    let design = create_group(&app.server, &admin, "Design", None).await;
    create_group(&app.server, &admin, "Ops", None).await;
    add_member(&app.server, &admin, design, user_id).await;

    let all: Value = app
        .server
        .get("/api/groups")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(all["meta"]["total"], 2);

    let mine: Value = app
        .server
        .get("/api/groups")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .json();
    assert_eq!(mine["meta"]["total"], 1);
    assert_eq!(mine["data"][0]["name"], "Design");
    assert_eq!(mine["data"][0]["member_count"], 1);
}

#[tokio::test]
async fn test_get_group_detail() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, token) = register_user(&app.server, "alice").await;
    let (_, outsider) = register_user(&app.server, "mallory").await;
    let group_id = create_group(&app.server, &admin, "Design", None).await;
    add_member(&app.server, &admin, group_id, user_id).await;
    upload_ok(&app.server, &token, group_id, "a.bin", vec![0u8; 300]).await;

    let response = app
        .server
        .get(&format!("/api/groups/{}", group_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "Design");
    assert_eq!(body["data"]["used_bytes"], 300);
    assert_eq!(body["data"]["members"][0]["username"], "alice");

    app.server
        .get(&format!("/api/groups/{}", group_id))
        .add_header(AUTHORIZATION, bearer(&outsider))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .get("/api/groups/9999")
        .add_header(AUTHORIZATION, bearer(&outsider))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_group() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let group_id = create_group(&app.server, &admin, "Design", Some(1000)).await;
    let path = format!("/api/groups/{}", group_id);

    let renamed: Value = app
        .server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "Product Design" }))
        .await
        .json();
    assert_eq!(renamed["data"]["name"], "Product Design");
    assert_eq!(renamed["data"]["storage_limit"], 1000);

    let cleared: Value = app
        .server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "storage_limit": null }))
        .await
        .json();
    assert!(cleared["data"]["storage_limit"].is_null());

    app.server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "storage_limit": -5 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .put("/api/groups/9999")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "Ghost" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_membership_management() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, _) = register_user(&app.server, "alice").await;
    let group_id = create_group(&app.server, &admin, "Design", None).await;
    let members_path = format!("/api/groups/{}/users", group_id);

    let added = app
        .server
        .post(&members_path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "user_id": user_id }))
        .await;
    added.assert_status(StatusCode::CREATED);
    assert_eq!(added.json::<Value>()["data"]["member_count"], 1);

    // Adding again is idempotent.
    app.server
        .post(&members_path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status_ok();

    app.server
        .post(&members_path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "user_id": 9999 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let remove_path = format!("/api/groups/{}/users/{}", group_id, user_id);
    app.server
        .delete(&remove_path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_ok();

    app.server
        .delete(&remove_path)
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_membership_requires_admin() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, token) = register_user(&app.server, "alice").await;
    let group_id = create_group(&app.server, &admin, "Design", None).await;

    app.server
        .post(&format!("/api/groups/{}/users", group_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "user_id": user_id }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_removed_member_keeps_files_but_loses_upload() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, token) = register_user(&app.server, "alice").await;
    let group_id = create_group(&app.server, &admin, "Design", None).await;
    add_member(&app.server, &admin, group_id, user_id).await;
    let file_id = upload_ok(&app.server, &token, group_id, "a.txt", b"hi".to_vec()).await;

    app.server
        .delete(&format!("/api/groups/{}/users/{}", group_id, user_id))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_ok();

    // Still the owner.
    app.server
        .get(&format!("/api/files/{}", file_id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();

    upload(&app.server, &token, group_id, "b.txt", b"hi".to_vec())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_group_removes_files() {
    let app = create_test_app().await;
    let admin = admin_token(&app.server).await;
    let (user_id, token) = register_user(&app.server, "alice").await;
    let group_id = create_group(&app.server, &admin, "Design", None).await;
    add_member(&app.server, &admin, group_id, user_id).await;
    let file_id = upload_ok(&app.server, &token, group_id, "a.txt", b"hi".to_vec()).await;

    let response = app
        .server
        .delete(&format!("/api/groups/{}", group_id))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["data"].is_null());

    app.server
        .get(&format!("/api/files/{}", file_id))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(blob_count(&app), 0);

    app.server
        .delete(&format!("/api/groups/{}", group_id))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
