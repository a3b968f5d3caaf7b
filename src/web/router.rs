//! Router configuration for the Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers::{auth, file, group, settings, user, AppState};
use super::middleware::{
    create_cors_layer, jwt_auth, login_rate_limit, security_headers, JwtState, RateLimitState,
};
use super::openapi::ApiDoc;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limit_state: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let login_route = post(auth::login).layer(middleware::from_fn(move |req, next| {
        let state = rate_limit_state.clone();
        login_rate_limit(state, req, next)
    }));

    let auth_routes = Router::new()
        .route("/login", login_route)
        .route("/register", post(auth::register))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let upload_route =
        post(file::upload_file).layer(DefaultBodyLimit::max(app_state.max_request_body));

    let file_routes = Router::new()
        .route("/", get(file::list_files).merge(upload_route))
        .route(
            "/:id",
            get(file::get_file)
                .put(file::update_file)
                .delete(file::delete_file),
        )
        .route("/:id/download", get(file::download_file));

    let group_routes = Router::new()
        .route("/", get(group::list_groups).post(group::create_group))
        .route(
            "/:id",
            get(group::get_group)
                .put(group::update_group)
                .delete(group::delete_group),
        )
        .route("/:id/users", post(group::add_member))
        .route("/:id/users/:user_id", delete(group::remove_member));

    let user_routes = Router::new()
        .route("/", get(user::list_users).post(user::create_user))
        .route(
            "/:id",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::delete_user),
        );

    let settings_routes = Router::new()
        .route(
            "/",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/public", get(settings::get_public_settings));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/files", file_routes)
        .nest("/groups", group_routes)
        .nest("/users", user_routes)
        .nest("/settings", settings_routes);

    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Serve the OpenAPI document.
pub fn create_openapi_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_router() {
        let response = create_health_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_openapi_router() {
        let response = create_openapi_router()
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/api/auth/login"].is_object());
    }
}
