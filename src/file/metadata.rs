//! File metadata types and repository.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::{Result, VaultError};

/// Moderation state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Pending => "pending",
            ApprovalState::Approved => "approved",
            ApprovalState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalState::Pending),
            "approved" => Ok(ApprovalState::Approved),
            "rejected" => Ok(ApprovalState::Rejected),
            _ => Err(format!("unknown approval state: {s}")),
        }
    }
}

impl TryFrom<String> for ApprovalState {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Metadata row for an uploaded file.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileMetadata {
    pub id: i64,
    /// Owner (uploader) user ID.
    pub user_id: i64,
    pub group_id: i64,
    /// Name the file was uploaded with.
    pub original_name: String,
    /// Blob name in `FileStorage`.
    pub stored_name: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApprovalState,
    pub rejection_reason: Option<String>,
    pub created_at: String,
}

/// Data for creating a new file row.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub user_id: i64,
    pub group_id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size: i64,
    pub description: Option<String>,
    pub status: ApprovalState,
}

const FILE_COLUMNS: &str = "id, user_id, group_id, original_name, stored_name, mime_type, size,
                            description, status, rejection_reason, created_at";

// Files a user may see: their own, and anything in a group they belong to.
const VISIBLE_TO_USER: &str = "user_id = $1
    OR group_id IN (SELECT group_id FROM group_members WHERE user_id = $1)";

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new file row.
    pub async fn create(&self, file: &NewFile) -> Result<FileMetadata> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO files (user_id, group_id, original_name, stored_name, mime_type, size,
                                description, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(file.user_id)
        .bind(file.group_id)
        .bind(&file.original_name)
        .bind(&file.stored_name)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(&file.description)
        .bind(file.status.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| VaultError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("file".to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileMetadata>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1");
        let file = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(file)
    }

    /// All files, newest first.
    pub async fn list_all(&self, offset: i64, limit: i64) -> Result<Vec<FileMetadata>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let files = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(files)
    }

    pub async fn count_all(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(count.0)
    }

    /// Files visible to a non-admin user, newest first.
    pub async fn list_visible(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FileMetadata>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE {VISIBLE_TO_USER}
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        let files = sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(files)
    }

    pub async fn count_visible(&self, user_id: i64) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM files WHERE {VISIBLE_TO_USER}");
        let count: (i64,) = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(count.0)
    }

    /// Set the moderation state. The rejection reason is cleared on approval.
    pub async fn set_approval(
        &self,
        id: i64,
        status: ApprovalState,
        rejection_reason: Option<&str>,
    ) -> Result<Option<FileMetadata>> {
        let reason = match status {
            ApprovalState::Rejected => rejection_reason,
            _ => None,
        };
        let result = sqlx::query("UPDATE files SET status = $1, rejection_reason = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(reason)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Cumulative usage of a user across all groups and approval states.
    pub async fn total_size_by_owner(&self, user_id: i64) -> Result<i64> {
        let size: (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(size), 0) FROM files WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(size.0)
    }

    pub async fn total_size_by_group(&self, group_id: i64) -> Result<i64> {
        let size: (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(size), 0) FROM files WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(size.0)
    }

    /// Blob names of a user's files, for cleanup before a cascading delete.
    pub async fn stored_names_by_owner(&self, user_id: i64) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT stored_name FROM files WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(self.pool)
                .await
                .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(names)
    }

    /// Blob names of a group's files, for cleanup before a cascading delete.
    pub async fn stored_names_by_group(&self, group_id: i64) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT stored_name FROM files WHERE group_id = $1")
                .bind(group_id)
                .fetch_all(self.pool)
                .await
                .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(names)
    }
}
