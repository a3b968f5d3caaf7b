//! Storage quota resolution.
//!
//! The ceiling applied to an upload is the uploader's personal limit if set,
//! otherwise the limit of the group being uploaded into, otherwise the
//! global default. Usage is the uploader's total across every group and
//! approval state.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::metadata::FileRepository;
use crate::db::{DbPool, Group, User};
use crate::settings::StorageSettings;
use crate::VaultError;

/// Which tier supplied the effective ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuotaSource {
    User,
    Group,
    Default,
}

/// Pick the ceiling by user → group → default precedence.
pub fn effective_ceiling(
    user_limit: Option<i64>,
    group_limit: Option<i64>,
    default_limit: i64,
) -> (i64, QuotaSource) {
    match (user_limit, group_limit) {
        (Some(limit), _) => (limit, QuotaSource::User),
        (None, Some(limit)) => (limit, QuotaSource::Group),
        (None, None) => (default_limit, QuotaSource::Default),
    }
}

/// Bytes as megabytes with two decimals.
pub fn format_mb(bytes: i64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("storage quota exceeded (limit {} MB)", format_mb(*limit_bytes))]
    Exceeded { limit_bytes: i64 },

    #[error(transparent)]
    Store(#[from] VaultError),
}

/// A user's storage position against their effective ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuotaUsage {
    pub used_bytes: i64,
    pub limit_bytes: i64,
    /// Never negative, even when an admin lowered the limit below usage.
    pub available_bytes: i64,
    pub source: QuotaSource,
}

pub struct QuotaResolver<'a> {
    pool: &'a DbPool,
    settings: &'a StorageSettings,
}

impl<'a> QuotaResolver<'a> {
    pub fn new(pool: &'a DbPool, settings: &'a StorageSettings) -> Self {
        Self { pool, settings }
    }

    /// Current usage. Without a group the group tier is skipped.
    pub async fn usage(&self, user: &User, group: Option<&Group>) -> Result<QuotaUsage, VaultError> {
        let used_bytes = FileRepository::new(self.pool)
            .total_size_by_owner(user.id)
            .await?;
        let (limit_bytes, source) = effective_ceiling(
            user.storage_limit,
            group.and_then(|g| g.storage_limit),
            self.settings.default_storage_limit,
        );

        Ok(QuotaUsage {
            used_bytes,
            limit_bytes,
            available_bytes: (limit_bytes - used_bytes).max(0),
            source,
        })
    }

    /// Refuse `incoming` bytes if they would take the user past the ceiling.
    ///
    /// Landing exactly on the ceiling is allowed.
    pub async fn check(
        &self,
        user: &User,
        group: &Group,
        incoming: i64,
    ) -> Result<QuotaUsage, QuotaError> {
        let usage = self.usage(user, Some(group)).await?;
        if usage.used_bytes.saturating_add(incoming) > usage.limit_bytes {
            return Err(QuotaError::Exceeded {
                limit_bytes: usage.limit_bytes,
            });
        }
        Ok(usage)
    }
}
