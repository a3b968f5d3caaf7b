//! OpenAPI document served at `/api-docs/openapi.json`.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::dto::{
    AddMemberRequest, CreateGroupRequest, CreateUserRequest, FileApprovalRequest, FileResponse,
    FileUploadForm, GroupDetailResponse, GroupRef, GroupResponse, LoginRequest, LoginResponse,
    LogoutRequest, MemberInfo, PaginationMeta, RefreshRequest, RefreshResponse, RegisterRequest,
    UpdateGroupRequest, UpdateSettingsRequest, UpdateUserRequest, UserDetailResponse,
    UserResponse,
};
use super::handlers::{auth, file, group, settings, user};
use crate::db::Role;
use crate::file::{ApprovalState, QuotaSource, QuotaUsage};
use crate::settings::{PublicSettings, StorageSettings};

#[derive(OpenApi)]
#[openapi(
    info(title = "groupvault API", description = "Group file storage with quotas"),
    paths(
        auth::login,
        auth::register,
        auth::refresh,
        auth::logout,
        auth::me,
        file::list_files,
        file::upload_file,
        file::get_file,
        file::update_file,
        file::delete_file,
        file::download_file,
        group::list_groups,
        group::create_group,
        group::get_group,
        group::update_group,
        group::delete_group,
        group::add_member,
        group::remove_member,
        user::list_users,
        user::create_user,
        user::get_user,
        user::update_user,
        user::delete_user,
        settings::get_settings,
        settings::update_settings,
        settings::get_public_settings,
    ),
    components(schemas(
        Role,
        ApprovalState,
        QuotaSource,
        QuotaUsage,
        StorageSettings,
        PublicSettings,
        PaginationMeta,
        LoginRequest,
        LoginResponse,
        RegisterRequest,
        RefreshRequest,
        RefreshResponse,
        LogoutRequest,
        UserResponse,
        UserDetailResponse,
        CreateUserRequest,
        UpdateUserRequest,
        GroupRef,
        GroupResponse,
        GroupDetailResponse,
        MemberInfo,
        CreateGroupRequest,
        UpdateGroupRequest,
        AddMemberRequest,
        FileResponse,
        FileUploadForm,
        FileApprovalRequest,
        UpdateSettingsRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, registration and tokens"),
        (name = "files", description = "Upload, moderation and download"),
        (name = "groups", description = "Groups and memberships"),
        (name = "users", description = "Account administration"),
        (name = "settings", description = "Upload policy")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
