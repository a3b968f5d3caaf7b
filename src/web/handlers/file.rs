//! File handlers: upload pipeline, listing, moderation and download.

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::auth::policy::{authorize_file, authorize_upload, needs_membership_lookup};
use crate::auth::{Actor, FileAction};
use crate::db::GroupRepository;
use crate::file::{
    validate_blocking, ApprovalState, FileMetadata, FileRepository, IntakeValidator, NewFile,
    QuotaResolver, MAX_DESCRIPTION_LENGTH, MAX_FILENAME_LENGTH,
};
use crate::web::dto::{
    ApiResponse, FileApprovalRequest, FileResponse, FileUploadForm, PaginatedResponse,
    PaginationQuery, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// Slack allowed on `Content-Length` for multipart framing and the small
/// text fields that travel with the file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Safe `Content-Disposition` value for a download.
///
/// Control characters are dropped so the name can't inject headers. Names
/// that aren't plain ASCII also get an RFC 5987 `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(filename)
    )
}

/// Final path component of a client-supplied name, without control
/// characters.
fn clean_original_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    base.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body too large")
    } else {
        tracing::debug!("Failed to read multipart data: {}", e);
        ApiError::bad_request("Invalid multipart data")
    }
}

/// Read a file field chunk by chunk, stopping as soon as the size ceiling
/// is crossed.
async fn read_file_field(
    field: &mut Field<'_>,
    validator: &IntakeValidator<'_>,
) -> Result<Vec<u8>, ApiError> {
    let mut content = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        content.extend_from_slice(&chunk);
        validator.check_size(content.len() as u64)?;
    }
    Ok(content)
}

async fn text_field(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Whether the actor may see the file, looking up membership only when
/// ownership or role don't already decide it.
async fn check_file_access(
    state: &AppState,
    actor: &Actor,
    file: &FileMetadata,
    action: FileAction,
) -> Result<(), ApiError> {
    let in_group = if needs_membership_lookup(actor, file) {
        GroupRepository::new(state.db.pool())
            .is_member(file.group_id, actor.user_id)
            .await?
    } else {
        false
    };
    authorize_file(actor, file, in_group, action)?;
    Ok(())
}

async fn load_file(state: &AppState, file_id: i64) -> Result<FileMetadata, ApiError> {
    FileRepository::new(state.db.pool())
        .get_by_id(file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("file not found"))
}

/// GET /api/files - Admins see every file; others their own files and
/// files in their groups. Newest first.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Visible files", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>, ApiError> {
    let pagination = pagination.normalized();
    let (offset, limit) = pagination.to_offset_limit();
    let repo = FileRepository::new(state.db.pool());

    let actor = state.current_actor(&auth).await?;
    let (files, total) = if actor.is_admin() {
        (repo.list_all(offset, limit).await?, repo.count_all().await?)
    } else {
        let user_id = actor.user_id;
        (
            repo.list_visible(user_id, offset, limit).await?,
            repo.count_visible(user_id).await?,
        )
    };

    Ok(Json(PaginatedResponse::new(
        files.into_iter().map(Into::into).collect(),
        pagination.page,
        pagination.per_page,
        total as u64,
    )))
}

/// POST /api/files - Upload a file into a group.
///
/// Checks run in order: size ceiling (declared length, then while
/// reading), extension denylist and archive contents, group membership,
/// storage quota. Admin uploads are approved immediately.
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    request_body(content = FileUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 403, description = "Not a member of the group"),
        (status = 404, description = "Group not found"),
        (status = 422, description = "Denied extension, invalid archive, too large, or over quota")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let user = state.current_user(&auth).await?;
    let actor = Actor::new(user.id, user.role);
    let settings = state.settings().await?;
    let validator = IntakeValidator::new(&settings);

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared {
        validator.check_size(length.saturating_sub(MULTIPART_OVERHEAD))?;
    }

    let mut original_name: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut group_id: Option<i64> = None;
    let mut description: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let name = clean_original_name(field.file_name().unwrap_or(""));
                if name.is_empty() {
                    return Err(ApiError::unprocessable("file name is required"));
                }
                if name.chars().count() > MAX_FILENAME_LENGTH {
                    return Err(ApiError::unprocessable(format!(
                        "file name must be at most {MAX_FILENAME_LENGTH} characters"
                    )));
                }
                // Refuse denied extensions before reading the body.
                validator.check_name(&name)?;
                content = Some(read_file_field(&mut field, &validator).await?);
                original_name = Some(name);
            }
            "group_id" => {
                let raw = text_field(field).await?;
                group_id = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| ApiError::bad_request("group_id must be an integer"))?,
                );
            }
            "description" => {
                let text = text_field(field).await?;
                let text = text.trim();
                if text.chars().count() > MAX_DESCRIPTION_LENGTH {
                    return Err(ApiError::unprocessable(format!(
                        "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
                    )));
                }
                if !text.is_empty() {
                    description = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let (original_name, content) = original_name
        .zip(content)
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let group_id = group_id.ok_or_else(|| ApiError::bad_request("group_id is required"))?;

    let (extension, content) =
        validate_blocking(settings.clone(), original_name.clone(), content).await?;

    let groups = GroupRepository::new(state.db.pool());
    let group = groups
        .get_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::not_found("group not found"))?;
    let in_group = !actor.is_admin() && groups.is_member(group.id, user.id).await?;
    authorize_upload(&actor, in_group)?;

    let size = content.len() as i64;
    QuotaResolver::new(state.db.pool(), &settings)
        .check(&user, &group, size)
        .await?;

    let stored_name = state
        .storage
        .save(&content, extension.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to save file: {}", e);
            ApiError::internal("Failed to save file")
        })?;

    let new_file = NewFile {
        user_id: user.id,
        group_id: group.id,
        mime_type: mime_guess::from_path(&original_name)
            .first_or_octet_stream()
            .to_string(),
        original_name,
        stored_name: stored_name.clone(),
        size,
        description,
        status: if actor.is_admin() {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        },
    };

    let file = match FileRepository::new(state.db.pool()).create(&new_file).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("Failed to create file metadata: {}", e);
            state.discard_blobs(&[stored_name]).await;
            return Err(ApiError::internal("Failed to create file"));
        }
    };

    tracing::info!(
        file_id = file.id,
        user_id = user.id,
        group_id = group.id,
        size,
        status = file.status.as_str(),
        "File uploaded"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::new(file.into()))))
}

/// GET /api/files/:id - File metadata.
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 403, description = "No access to this file"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let actor = state.current_actor(&auth).await?;
    let file = load_file(&state, file_id).await?;
    check_file_access(&state, &actor, &file, FileAction::View).await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// PUT /api/files/:id - Approve or reject a file (admin).
#[utoipa::path(
    put,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    request_body = FileApprovalRequest,
    responses(
        (status = 200, description = "Approval state updated", body = FileResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "File not found"),
        (status = 422, description = "Rejection without a reason")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<FileApprovalRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let actor = state.current_actor(&auth).await?;
    let file = load_file(&state, file_id).await?;
    authorize_file(&actor, &file, false, FileAction::Moderate)?;

    let reason = req
        .rejection_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let status = if req.approved {
        ApprovalState::Approved
    } else {
        if reason.is_none() {
            return Err(ApiError::unprocessable(
                "rejection_reason is required when rejecting a file",
            ));
        }
        ApprovalState::Rejected
    };

    let file = FileRepository::new(state.db.pool())
        .set_approval(file_id, status, reason)
        .await?
        .ok_or_else(|| ApiError::not_found("file not found"))?;

    tracing::info!(file_id, status = status.as_str(), admin_id = auth.user_id(), "File moderated");
    Ok(Json(ApiResponse::new(file.into())))
}

/// DELETE /api/files/:id - Delete a file (owner or admin).
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let actor = state.current_actor(&auth).await?;
    let file = load_file(&state, file_id).await?;
    authorize_file(&actor, &file, false, FileAction::Delete)?;

    if !FileRepository::new(state.db.pool()).delete(file_id).await? {
        return Err(ApiError::not_found("file not found"));
    }
    state.discard_blobs(&[file.stored_name]).await;

    tracing::info!(file_id, user_id = auth.user_id(), "File deleted");
    Ok(Json(ApiResponse::new(())))
}

/// GET /api/files/:id/download - Stored bytes under the original name.
///
/// Also accepts the access token as `?token=` so links can be opened
/// directly.
#[utoipa::path(
    get,
    path = "/api/files/{id}/download",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 403, description = "No access to this file"),
        (status = 404, description = "File not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Response, ApiError> {
    let actor = state.current_actor(&auth).await?;
    let file = load_file(&state, file_id).await?;
    check_file_access(&state, &actor, &file, FileAction::Download).await?;

    let content = state.storage.load(&file.stored_name).await.map_err(|e| {
        tracing::error!(file_id, stored_name = %file.stored_name, "Failed to read blob: {}", e);
        ApiError::not_found("file content not found")
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &file.mime_type)
        .header(header::CONTENT_LENGTH, content.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&file.original_name),
        )
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            ApiError::internal("Failed to build response")
        })
}
