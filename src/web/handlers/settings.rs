//! Upload policy handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::auth::policy::require_admin;
use crate::settings::{PublicSettings, SettingsStore, SettingsUpdate, StorageSettings};
use crate::web::dto::{ApiResponse, UpdateSettingsRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /api/settings - Full policy including the extension denylist (admin).
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings", body = StorageSettings),
        (status = 403, description = "Admin access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<StorageSettings>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;
    Ok(Json(ApiResponse::new(state.settings().await?)))
}

/// PUT /api/settings - Change any subset of the settings (admin).
#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings after the update", body = StorageSettings),
        (status = 403, description = "Admin access required"),
        (status = 422, description = "Validation failed, dotted extension, or max_file_size above the request limit")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<StorageSettings>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;
    if req
        .max_file_size
        .is_some_and(|max| max as u64 > state.max_request_body as u64)
    {
        return Err(ApiError::unprocessable(format!(
            "max_file_size must not exceed the upload request limit of {} bytes",
            state.max_request_body
        )));
    }

    let update = SettingsUpdate {
        banned_extensions: req.banned_extensions,
        default_storage_limit: req.default_storage_limit,
        max_file_size: req.max_file_size,
    };
    let settings = SettingsStore::new(state.db.pool()).update(&update).await?;
    tracing::info!(
        admin_id = auth.user_id(),
        banned = settings.banned_extensions.len(),
        default_storage_limit = settings.default_storage_limit,
        max_file_size = settings.max_file_size,
        "Settings updated"
    );

    Ok(Json(ApiResponse::new(settings)))
}

/// GET /api/settings/public - Limits every user may see; never the denylist.
#[utoipa::path(
    get,
    path = "/api/settings/public",
    tag = "settings",
    responses(
        (status = 200, description = "Public limits", body = PublicSettings),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_public_settings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PublicSettings>>, ApiError> {
    state.current_user(&auth).await?;
    Ok(Json(ApiResponse::new(state.settings().await?.public_view())))
}
