//! Blob storage on the local file system.
//!
//! This module provides physical file storage functionality:
//! - UUID-based file naming that keeps the original extension
//! - Directory sharding by first 2 characters of the UUID
//! - Save, load, and delete operations

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{Result, VaultError};

/// Blob store for uploaded file contents.
///
/// Files are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
/// ├── cd/
/// │   └── cd90ab12-3456-7890-abcd-ef1234567890
/// └── ...
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at `base_path`, creating it if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store `content` under a fresh name and return that name.
    ///
    /// `extension` is the already-normalized extension of the original name,
    /// if any.
    pub async fn save(&self, content: &[u8], extension: Option<&str>) -> Result<String> {
        let stored_name = Self::generate_stored_name(extension);
        let file_path = self.file_path(&stored_name)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, content).await?;

        Ok(stored_name)
    }

    /// Read a stored blob.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        let file_path = self.file_path(stored_name)?;

        match fs::read(&file_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VaultError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob. Returns `false` if it didn't exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        let file_path = self.file_path(stored_name)?;

        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.file_path(stored_name) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Full path of a stored blob: `{base_path}/{shard}/{stored_name}`.
    ///
    /// Names containing path separators or parent references are refused.
    pub fn file_path(&self, stored_name: &str) -> Result<PathBuf> {
        if stored_name.is_empty()
            || stored_name.contains(['/', '\\'])
            || stored_name.starts_with('.')
        {
            return Err(VaultError::Validation(format!(
                "invalid stored name: {stored_name}"
            )));
        }
        Ok(self
            .base_path
            .join(Self::shard(stored_name))
            .join(stored_name))
    }

    fn shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// `uuid.ext`, or a bare UUID when there is no extension.
    pub fn generate_stored_name(extension: Option<&str>) -> String {
        let uuid = Uuid::new_v4();
        match extension {
            Some(ext) if !ext.is_empty() => format!("{uuid}.{ext}"),
            _ => uuid.to_string(),
        }
    }
}
