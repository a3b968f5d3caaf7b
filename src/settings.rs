//! Global upload policy stored in the `settings` table.
//!
//! Each setting is one row. Missing or unparsable rows fall back to the
//! built-in defaults, so a damaged row never blocks uploads entirely.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::{Result, VaultError};

pub const KEY_BANNED_EXTENSIONS: &str = "banned_extensions";
pub const KEY_DEFAULT_STORAGE_LIMIT: &str = "default_storage_limit";
pub const KEY_MAX_FILE_SIZE: &str = "max_file_size";

/// 10 MiB.
pub const DEFAULT_STORAGE_LIMIT: i64 = 10 * 1024 * 1024;
/// 5 MiB.
pub const DEFAULT_MAX_FILE_SIZE: i64 = 5 * 1024 * 1024;

/// Extensions denied when the table holds no usable list.
pub const DEFAULT_BANNED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "js", "php", "sh", "py", "rb", "pl", "cgi", "asp", "aspx", "jsp", "jar", "dll",
];

/// Effective upload policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageSettings {
    /// Lowercase extensions without the leading dot.
    pub banned_extensions: Vec<String>,
    /// Ceiling in bytes for users without a personal or group limit.
    pub default_storage_limit: i64,
    /// Largest accepted single file in bytes.
    pub max_file_size: i64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            banned_extensions: DEFAULT_BANNED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_storage_limit: DEFAULT_STORAGE_LIMIT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// The subset of settings visible to non-admin users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicSettings {
    pub default_storage_limit: i64,
    pub max_file_size: i64,
}

impl StorageSettings {
    /// Case-insensitive denylist lookup. `ext` is given without a dot.
    pub fn is_banned(&self, ext: &str) -> bool {
        self.banned_extensions
            .iter()
            .any(|banned| banned.eq_ignore_ascii_case(ext))
    }

    pub fn public_view(&self) -> PublicSettings {
        PublicSettings {
            default_storage_limit: self.default_storage_limit,
            max_file_size: self.max_file_size,
        }
    }
}

/// Partial settings change. Absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub banned_extensions: Option<Vec<String>>,
    pub default_storage_limit: Option<i64>,
    pub max_file_size: Option<i64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.banned_extensions.is_none()
            && self.default_storage_limit.is_none()
            && self.max_file_size.is_none()
    }
}

/// Trim, strip leading dots, lowercase, drop empties and duplicates.
///
/// Order of first appearance is kept.
pub fn normalize_extensions<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.iter()
        .map(|s| s.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Uploads are matched on the text after their last dot, so a denylist entry
/// must be a single segment. Leading dots and surrounding whitespace are
/// stripped by [`normalize_extensions`] and don't count.
pub fn is_single_extension(raw: &str) -> bool {
    !raw.trim()
        .trim_start_matches('.')
        .chars()
        .any(|c| c == '.' || c == '/' || c == '\\' || c.is_whitespace())
}

/// Reads and writes `StorageSettings` rows.
pub struct SettingsStore<'a> {
    pool: &'a DbPool,
}

impl<'a> SettingsStore<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Load the current settings, substituting defaults where needed.
    pub async fn load(&self) -> Result<StorageSettings> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        let mut settings = StorageSettings::default();
        for (key, value) in rows {
            match key.as_str() {
                KEY_BANNED_EXTENSIONS => match serde_json::from_str::<Vec<String>>(&value) {
                    Ok(list) => settings.banned_extensions = normalize_extensions(&list),
                    Err(e) => warn!("ignoring unparsable {}: {}", key, e),
                },
                KEY_DEFAULT_STORAGE_LIMIT => match value.trim().parse::<i64>() {
                    Ok(v) if v >= 0 => settings.default_storage_limit = v,
                    _ => warn!("ignoring invalid {} value {:?}", key, value),
                },
                KEY_MAX_FILE_SIZE => match value.trim().parse::<i64>() {
                    Ok(v) if v >= 0 => settings.max_file_size = v,
                    _ => warn!("ignoring invalid {} value {:?}", key, value),
                },
                _ => {}
            }
        }

        Ok(settings)
    }

    /// Upsert every present key, then return the resulting settings.
    pub async fn update(&self, update: &SettingsUpdate) -> Result<StorageSettings> {
        let mut tx = self.pool.begin().await?;

        if let Some(ref exts) = update.banned_extensions {
            if let Some(bad) = exts.iter().find(|e| !is_single_extension(e)) {
                return Err(VaultError::Validation(format!(
                    "invalid extension {bad:?}: use a single segment such as \"gz\""
                )));
            }
            let json = serde_json::to_string(&normalize_extensions(exts))
                .map_err(|e| VaultError::Validation(e.to_string()))?;
            upsert(&mut tx, KEY_BANNED_EXTENSIONS, &json).await?;
        }
        if let Some(limit) = update.default_storage_limit {
            upsert(&mut tx, KEY_DEFAULT_STORAGE_LIMIT, &limit.to_string()).await?;
        }
        if let Some(max) = update.max_file_size {
            upsert(&mut tx, KEY_MAX_FILE_SIZE, &max.to_string()).await?;
        }

        tx.commit().await?;
        self.load().await
    }
}

async fn upsert(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    key: &str,
    value: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .execute(&mut **tx)
    .await
    .map_err(|e| VaultError::Database(e.to_string()))?;
    Ok(())
}
