//! Request DTOs for the REST API.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::validation::{
    double_option, no_control_chars, not_empty_trimmed, plain_text, username_chars,
};
use crate::db::Role;

/// Largest page size a client may ask for.
pub const MAX_PER_PAGE: u32 = 100;
pub const DEFAULT_PER_PAGE: u32 = 20;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

/// `?page=&per_page=` query parameters.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page, at most 100.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationQuery {
    /// Clamp out-of-range values instead of rejecting them.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn to_offset_limit(&self) -> (i64, i64) {
        let offset = (self.page.saturating_sub(1) as i64) * self.per_page as i64;
        (offset, self.per_page as i64)
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(custom(function = "not_empty_trimmed"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Self-service registration. New accounts are always regular users.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3-32 characters"),
        custom(function = "username_chars")
    )]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(
        length(min = 1, max = 64, message = "Display name must be 1-64 characters"),
        custom(function = "plain_text")
    )]
    pub display_name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

// ============================================================================
// Users (admin)
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3-32 characters"),
        custom(function = "username_chars")
    )]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(
        length(min = 1, max = 64, message = "Display name must be 1-64 characters"),
        custom(function = "plain_text")
    )]
    pub display_name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Personal ceiling in bytes; omit for none.
    #[serde(default)]
    #[validate(range(min = 0, message = "Storage limit must not be negative"))]
    pub storage_limit: Option<i64>,
}

/// Partial update. `email` and `storage_limit` accept `null` to clear.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: Option<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 64, message = "Display name must be 1-64 characters"),
        custom(function = "plain_text")
    )]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub storage_limit: Option<Option<i64>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// ============================================================================
// Groups (admin)
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGroupRequest {
    #[validate(
        length(min = 1, max = 64, message = "Group name must be 1-64 characters"),
        custom(function = "plain_text")
    )]
    pub name: String,
    #[serde(default)]
    #[validate(
        length(max = 500, message = "Description is too long"),
        custom(function = "no_control_chars")
    )]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Storage limit must not be negative"))]
    pub storage_limit: Option<i64>,
}

/// Partial update. `storage_limit: null` removes the group ceiling.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 64, message = "Group name must be 1-64 characters"),
        custom(function = "plain_text")
    )]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(
        length(max = 500, message = "Description is too long"),
        custom(function = "no_control_chars")
    )]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub storage_limit: Option<Option<i64>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

// ============================================================================
// Files
// ============================================================================

/// Approve or reject a file. A reason is required when rejecting.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FileApprovalRequest {
    pub approved: bool,
    #[serde(default)]
    #[validate(
        length(max = 500, message = "Reason is too long"),
        custom(function = "no_control_chars")
    )]
    pub rejection_reason: Option<String>,
}

/// Multipart form accepted by `POST /api/files` (documentation only).
#[derive(Debug, ToSchema)]
pub struct FileUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub group_id: i64,
    pub description: Option<String>,
}

// ============================================================================
// Settings (admin)
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub banned_extensions: Option<Vec<String>>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Default storage limit must not be negative"))]
    pub default_storage_limit: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Maximum file size must be positive"))]
    pub max_file_size: Option<i64>,
}
