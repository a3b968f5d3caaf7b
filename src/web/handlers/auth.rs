//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use jsonwebtoken::{encode, Header};
use std::sync::Arc;

use super::AppState;
use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::datetime::sqlite_after_days;
use crate::db::{
    GroupRepository, NewRefreshToken, NewUser, RefreshTokenRepository, User, UserRepository,
};
use crate::file::QuotaResolver;
use crate::web::dto::{
    ApiResponse, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse,
    RegisterRequest, UserDetailResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, JwtClaims};

const BAD_CREDENTIALS: &str = "Invalid username or password";

impl AppState {
    /// Sign an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// An unsaved refresh token for a user.
    pub fn generate_refresh_token(&self, user_id: i64) -> NewRefreshToken {
        NewRefreshToken {
            user_id,
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: sqlite_after_days(self.refresh_token_expiry),
        }
    }

    /// Issue an access/refresh token pair and persist the refresh token.
    async fn issue_session(&self, user: User) -> Result<LoginResponse, ApiError> {
        let access_token = self.generate_access_token(&user)?;
        let refresh = self.generate_refresh_token(user.id);

        RefreshTokenRepository::new(self.db.pool())
            .create(&refresh)
            .await
            .map_err(|e| {
                tracing::error!("Failed to store refresh token: {}", e);
                ApiError::internal("Failed to create session")
            })?;

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh.token,
            expires_in: self.access_token_expiry,
            user: user.into(),
        })
    }
}

/// POST /api/auth/login - User login.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_username(req.username.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized(BAD_CREDENTIALS))?;

    verify_password_blocking(req.password, user.password.clone())
        .await
        .map_err(|_| ApiError::unauthorized(BAD_CREDENTIALS))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    if let Err(e) = UserRepository::new(state.db.pool())
        .update_last_login(user.id)
        .await
    {
        tracing::warn!(user_id = user.id, "Failed to record last login: {}", e);
    }

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");
    let response = state.issue_session(user).await?;
    Ok(Json(ApiResponse::new(response)))
}

/// POST /api/auth/register - Create a regular account and log it in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = LoginResponse),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoginResponse>>), ApiError> {
    let password_hash = hash_password_blocking(req.password)
        .await
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    let mut new_user = NewUser::new(&req.username, password_hash, req.display_name.trim());
    if let Some(email) = req.email {
        new_user = new_user.with_email(email);
    }
    let user = UserRepository::new(state.db.pool())
        .create(&new_user)
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    let response = state.issue_session(user).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(response))))
}

/// POST /api/auth/refresh - Exchange a refresh token for a new pair.
///
/// The presented token is revoked in the same transaction that stores its
/// replacement, so a token can be redeemed only once.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let tokens = RefreshTokenRepository::new(state.db.pool());
    let current = tokens
        .get_valid_token(&req.refresh_token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let user = UserRepository::new(state.db.pool())
        .get_by_id(current.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let replacement = state.generate_refresh_token(user.id);
    tokens
        .rotate(&req.refresh_token, &replacement)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let response = RefreshResponse {
        access_token: state.generate_access_token(&user)?,
        refresh_token: replacement.token,
        expires_in: state.access_token_expiry,
    };
    Ok(Json(ApiResponse::new(response)))
}

/// POST /api/auth/logout - Revoke a refresh token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let tokens = RefreshTokenRepository::new(state.db.pool());

    // Only the owner's tokens can be revoked; anything else is a silent no-op.
    if let Some(token) = tokens.get_by_token(&req.refresh_token).await? {
        if token.user_id == auth.user_id() {
            tokens.revoke(&req.refresh_token).await?;
        }
    }

    Ok(Json(ApiResponse::new(())))
}

/// GET /api/auth/me - Current user with groups and quota usage.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserDetailResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<UserDetailResponse>>, ApiError> {
    let user = state.current_user(&auth).await?;
    let response = user_detail(&state, user).await?;
    Ok(Json(ApiResponse::new(response)))
}

/// Build the detailed user view. Without a group context the quota falls
/// back from the personal limit straight to the global default.
pub(crate) async fn user_detail(
    state: &AppState,
    user: User,
) -> Result<UserDetailResponse, ApiError> {
    let groups = GroupRepository::new(state.db.pool())
        .list_for_user(user.id)
        .await?;
    let settings = state.settings().await?;
    let quota = QuotaResolver::new(state.db.pool(), &settings)
        .usage(&user, None)
        .await?;

    Ok(UserDetailResponse {
        user: user.into(),
        groups: groups.into_iter().map(Into::into).collect(),
        quota,
    })
}
