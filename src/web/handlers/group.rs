//! Group handlers. Reading is open to members; everything else is admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::auth::policy::{authorize_group_read, require_admin};
use crate::db::{GroupRepository, GroupUpdate, NewGroup, UserRepository};
use crate::file::FileRepository;
use crate::web::dto::validation::non_negative_limit;
use crate::web::dto::{
    AddMemberRequest, ApiResponse, CreateGroupRequest, GroupDetailResponse, GroupResponse,
    PaginatedResponse, PaginationQuery, UpdateGroupRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

async fn group_detail(state: &AppState, group_id: i64) -> Result<GroupDetailResponse, ApiError> {
    let summary = GroupRepository::new(state.db.pool())
        .get_summary(group_id)
        .await?
        .ok_or_else(|| ApiError::not_found("group not found"))?;
    let members = UserRepository::new(state.db.pool())
        .list_by_group(group_id)
        .await?;

    Ok(GroupDetailResponse {
        group: summary.into(),
        members: members.into_iter().map(Into::into).collect(),
    })
}

/// GET /api/groups - Admins see every group, others the groups they belong to.
#[utoipa::path(
    get,
    path = "/api/groups",
    tag = "groups",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Groups with member count and usage", body = Vec<GroupResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<GroupResponse>>, ApiError> {
    let pagination = pagination.normalized();
    let (offset, limit) = pagination.to_offset_limit();
    let repo = GroupRepository::new(state.db.pool());

    let actor = state.current_actor(&auth).await?;
    let (groups, total) = if actor.is_admin() {
        (repo.list_summaries(offset, limit).await?, repo.count().await?)
    } else {
        let user_id = actor.user_id;
        (
            repo.list_summaries_for_user(user_id, offset, limit).await?,
            repo.count_for_user(user_id).await?,
        )
    };

    Ok(Json(PaginatedResponse::new(
        groups.into_iter().map(Into::into).collect(),
        pagination.page,
        pagination.per_page,
        total as u64,
    )))
}

/// POST /api/groups - Create a group (admin).
#[utoipa::path(
    post,
    path = "/api/groups",
    tag = "groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Group name already taken")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupResponse>>), ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    let mut new_group = NewGroup::new(req.name.trim()).with_storage_limit(req.storage_limit);
    if let Some(description) = req.description {
        new_group = new_group.with_description(description.trim());
    }

    let repo = GroupRepository::new(state.db.pool());
    let group = repo.create(&new_group).await?;
    tracing::info!(group_id = group.id, name = %group.name, "Group created");

    let summary = repo
        .get_summary(group.id)
        .await?
        .ok_or_else(|| ApiError::not_found("group not found"))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(summary.into()))))
}

/// GET /api/groups/:id - Group with its members.
#[utoipa::path(
    get,
    path = "/api/groups/{id}",
    tag = "groups",
    params(
        ("id" = i64, Path, description = "Group ID")
    ),
    responses(
        (status = 200, description = "Group detail", body = GroupDetailResponse),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Group not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<ApiResponse<GroupDetailResponse>>, ApiError> {
    let actor = state.current_actor(&auth).await?;
    let repo = GroupRepository::new(state.db.pool());

    if repo.get_by_id(group_id).await?.is_none() {
        return Err(ApiError::not_found("group not found"));
    }
    let in_group = !actor.is_admin() && repo.is_member(group_id, actor.user_id).await?;
    authorize_group_read(&actor, in_group)?;

    Ok(Json(ApiResponse::new(group_detail(&state, group_id).await?)))
}

/// PUT /api/groups/:id - Update a group (admin).
#[utoipa::path(
    put,
    path = "/api/groups/{id}",
    tag = "groups",
    params(
        ("id" = i64, Path, description = "Group ID")
    ),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated", body = GroupResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Group not found"),
        (status = 409, description = "Group name already taken")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateGroupRequest>,
) -> Result<Json<ApiResponse<GroupResponse>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;
    non_negative_limit(req.storage_limit.flatten())?;

    let update = GroupUpdate {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description.map(|d| d.trim().to_string()),
        storage_limit: req.storage_limit,
    };

    let repo = GroupRepository::new(state.db.pool());
    repo.update(group_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("group not found"))?;

    let summary = repo
        .get_summary(group_id)
        .await?
        .ok_or_else(|| ApiError::not_found("group not found"))?;
    Ok(Json(ApiResponse::new(summary.into())))
}

/// DELETE /api/groups/:id - Delete a group, its memberships and its files (admin).
#[utoipa::path(
    delete,
    path = "/api/groups/{id}",
    tag = "groups",
    params(
        ("id" = i64, Path, description = "Group ID")
    ),
    responses(
        (status = 200, description = "Group deleted"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Group not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    let blobs = FileRepository::new(state.db.pool())
        .stored_names_by_group(group_id)
        .await?;

    if !GroupRepository::new(state.db.pool())
        .delete(group_id)
        .await?
    {
        return Err(ApiError::not_found("group not found"));
    }

    state.discard_blobs(&blobs).await;
    tracing::info!(group_id, files = blobs.len(), "Group deleted");

    Ok(Json(ApiResponse::new(())))
}

/// POST /api/groups/:id/users - Add a member (admin).
///
/// Adding an existing member is not an error; the response is 200 instead
/// of 201.
#[utoipa::path(
    post,
    path = "/api/groups/{id}/users",
    tag = "groups",
    params(
        ("id" = i64, Path, description = "Group ID")
    ),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = GroupDetailResponse),
        (status = 200, description = "Already a member", body = GroupDetailResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Group or user not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupDetailResponse>>), ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    let repo = GroupRepository::new(state.db.pool());
    if repo.get_by_id(group_id).await?.is_none() {
        return Err(ApiError::not_found("group not found"));
    }
    if UserRepository::new(state.db.pool())
        .get_by_id(req.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("user not found"));
    }

    let added = repo.add_member(group_id, req.user_id).await?;
    let status = if added {
        tracing::info!(group_id, user_id = req.user_id, "Member added");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ApiResponse::new(group_detail(&state, group_id).await?))))
}

/// DELETE /api/groups/:id/users/:user_id - Remove a member (admin).
///
/// The member's files in the group stay; they still count toward the
/// uploader's usage.
#[utoipa::path(
    delete,
    path = "/api/groups/{id}/users/{user_id}",
    tag = "groups",
    params(
        ("id" = i64, Path, description = "Group ID"),
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Member removed"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Membership not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_admin(&state.current_actor(&auth).await?)?;

    if !GroupRepository::new(state.db.pool())
        .remove_member(group_id, user_id)
        .await?
    {
        return Err(ApiError::not_found("membership not found"));
    }

    tracing::info!(group_id, user_id, "Member removed");
    Ok(Json(ApiResponse::new(())))
}
