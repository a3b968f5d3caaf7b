//! API handlers.

pub mod auth;
pub mod file;
pub mod group;
pub mod settings;
pub mod user;

use jsonwebtoken::EncodingKey;

use crate::auth::Actor;
use crate::db::{User, UserRepository};
use crate::file::FileStorage;
use crate::settings::{SettingsStore, StorageSettings};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::Database;

/// Application state shared across handlers.
pub struct AppState {
    pub db: Database,
    /// Blob store for uploaded files.
    pub storage: FileStorage,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Refresh token expiry in days.
    pub refresh_token_expiry: u64,
    /// Largest accepted request body in bytes (multipart uploads).
    pub max_request_body: usize,
}

impl AppState {
    pub fn new(
        db: Database,
        storage: FileStorage,
        jwt_secret: &str,
        access_expiry: u64,
        refresh_expiry: u64,
    ) -> Self {
        Self {
            db,
            storage,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
            max_request_body: 64 * 1024 * 1024,
        }
    }

    pub fn with_max_request_body(mut self, bytes: usize) -> Self {
        self.max_request_body = bytes;
        self
    }

    /// The account behind a token. Deleted or deactivated accounts are
    /// treated as unauthenticated even while their token is unexpired.
    pub async fn current_user(&self, auth: &AuthUser) -> Result<User, ApiError> {
        let user = UserRepository::new(self.db.pool())
            .get_by_id(auth.user_id())
            .await?
            .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

        if !user.is_active {
            return Err(ApiError::forbidden("Account is disabled"));
        }
        Ok(user)
    }

    /// Permissions of the reloaded account, so deactivation and role changes
    /// apply to tokens issued before them.
    pub async fn current_actor(&self, auth: &AuthUser) -> Result<Actor, ApiError> {
        let user = self.current_user(auth).await?;
        Ok(Actor::new(user.id, user.role))
    }

    /// Current upload policy.
    pub async fn settings(&self) -> Result<StorageSettings, ApiError> {
        Ok(SettingsStore::new(self.db.pool()).load().await?)
    }

    /// Delete blobs, logging failures. Used after their rows are gone.
    pub async fn discard_blobs(&self, stored_names: &[String]) {
        for name in stored_names {
            if let Err(e) = self.storage.delete(name).await {
                tracing::warn!(stored_name = %name, "Failed to delete blob: {}", e);
            }
        }
    }
}
