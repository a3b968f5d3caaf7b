//! User administration handlers (admin only).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use validator::ValidateEmail;

use super::auth::user_detail;
use super::AppState;
use crate::auth::hash_password_blocking;
use crate::auth::policy::require_admin;
use crate::db::{NewUser, RefreshTokenRepository, Role, UserRepository, UserUpdate};
use crate::file::FileRepository;
use crate::web::dto::validation::non_negative_limit;
use crate::web::dto::{
    ApiResponse, CreateUserRequest, PaginatedResponse, PaginationQuery, UpdateUserRequest,
    UserDetailResponse, UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /api/users - List all users.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Users", body = Vec<UserResponse>),
        (status = 403, description = "Admin access required")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    let pagination = pagination.normalized();
    let (offset, limit) = pagination.to_offset_limit();
    let repo = UserRepository::new(state.db.pool());
    let users = repo.list(offset, limit).await?;
    let total = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(Into::into).collect(),
        pagination.page,
        pagination.per_page,
        total as u64,
    )))
}

/// POST /api/users - Create an account with any role.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Validation failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    let password_hash = hash_password_blocking(req.password)
        .await
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    let mut new_user = NewUser::new(&req.username, password_hash, req.display_name.trim())
        .with_role(req.role.unwrap_or_default())
        .with_storage_limit(req.storage_limit);
    if let Some(email) = req.email {
        new_user = new_user.with_email(email);
    }

    let user = UserRepository::new(state.db.pool())
        .create(&new_user)
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User created");

    Ok((StatusCode::CREATED, Json(ApiResponse::new(user.into()))))
}

/// GET /api/users/:id - User with groups and quota usage.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User detail", body = UserDetailResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<UserDetailResponse>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    let user = UserRepository::new(state.db.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(ApiResponse::new(user_detail(&state, user).await?)))
}

/// PUT /api/users/:id - Partial update. `storage_limit: null` clears the
/// personal ceiling.
///
/// Deactivating an account or changing its password revokes its refresh
/// tokens. The last active administrator can't be demoted or deactivated.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Would leave no active administrator"),
        (status = 422, description = "Validation failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;
    non_negative_limit(req.storage_limit.flatten())?;
    if let Some(Some(ref email)) = req.email {
        if !email.validate_email() {
            return Err(ApiError::unprocessable("Invalid email address"));
        }
    }

    let users = UserRepository::new(state.db.pool());
    let existing = users
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let loses_admin = existing.role == Role::Admin
        && existing.is_active
        && (req.role.is_some_and(|r| r != Role::Admin) || req.is_active == Some(false));
    if loses_admin && users.count_active_by_role(Role::Admin).await? <= 1 {
        return Err(ApiError::conflict(
            "At least one active administrator is required",
        ));
    }

    let revoke_sessions = req.password.is_some() || req.is_active == Some(false);
    let password = match req.password {
        Some(password) => Some(
            hash_password_blocking(password)
                .await
                .map_err(|e| ApiError::unprocessable(e.to_string()))?,
        ),
        None => None,
    };

    let update = UserUpdate {
        password,
        display_name: req.display_name.map(|n| n.trim().to_string()),
        email: req.email,
        role: req.role,
        storage_limit: req.storage_limit,
        is_active: req.is_active,
    };

    let user = users
        .update(user_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if revoke_sessions {
        let revoked = RefreshTokenRepository::new(state.db.pool())
            .revoke_all_for_user(user_id)
            .await?;
        tracing::info!(user_id, revoked, "Refresh tokens revoked");
    }

    Ok(Json(ApiResponse::new(user.into())))
}

/// DELETE /api/users/:id - Delete an account with its files and memberships.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Admin access required, or deleting own account"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let actor = state.current_actor(&auth).await?;
    require_admin(&actor)?;
    if actor.user_id == user_id {
        return Err(ApiError::forbidden("You cannot delete your own account"));
    }

    let blobs = FileRepository::new(state.db.pool())
        .stored_names_by_owner(user_id)
        .await?;

    if !UserRepository::new(state.db.pool())
        .delete(user_id)
        .await?
    {
        return Err(ApiError::not_found("user not found"));
    }

    state.discard_blobs(&blobs).await;
    tracing::info!(user_id, files = blobs.len(), "User deleted");

    Ok(Json(ApiResponse::new(())))
}
