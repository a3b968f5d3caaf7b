//! Response DTOs for the REST API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::datetime::{to_rfc3339, to_rfc3339_opt};
use crate::db::{Group, GroupSummary, Role, User};
use crate::file::{ApprovalState, FileMetadata, QuotaUsage};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// `{"data": ...}` envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{"data": [...], "meta": {...}}` envelope.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

// ============================================================================
// Users
// ============================================================================

/// A user account. The credential hash is never serialized.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    /// Personal ceiling in bytes, `null` when none is set.
    pub storage_limit: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            role: user.role,
            storage_limit: user.storage_limit,
            is_active: user.is_active,
            created_at: to_rfc3339(&user.created_at),
            last_login: to_rfc3339_opt(user.last_login.as_deref()),
        }
    }
}

/// A user with their groups and storage position. Returned by
/// `/api/auth/me` and the admin user view.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub groups: Vec<GroupRef>,
    pub quota: QuotaUsage,
}

/// Minimal group reference.
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupRef {
    pub id: i64,
    pub name: String,
}

impl From<Group> for GroupRef {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Group ceiling in bytes, `null` when none is set.
    pub storage_limit: Option<i64>,
    pub member_count: i64,
    /// Sum of sizes of files uploaded into the group.
    pub used_bytes: i64,
    pub created_at: String,
}

impl From<GroupSummary> for GroupResponse {
    fn from(summary: GroupSummary) -> Self {
        let GroupSummary {
            group,
            member_count,
            used_bytes,
        } = summary;
        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            storage_limit: group.storage_limit,
            member_count,
            used_bytes,
            created_at: to_rfc3339(&group.created_at),
        }
    }
}

/// Public view of a group member.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberInfo {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl From<User> for MemberInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupDetailResponse {
    #[serde(flatten)]
    pub group: GroupResponse,
    pub members: Vec<MemberInfo>,
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    pub id: i64,
    /// Uploader.
    pub user_id: i64,
    pub group_id: i64,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ApprovalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: String,
}

impl From<FileMetadata> for FileResponse {
    fn from(file: FileMetadata) -> Self {
        Self {
            id: file.id,
            user_id: file.user_id,
            group_id: file.group_id,
            original_name: file.original_name,
            mime_type: file.mime_type,
            size: file.size,
            description: file.description,
            status: file.status,
            rejection_reason: file.rejection_reason,
            created_at: to_rfc3339(&file.created_at),
        }
    }
}
