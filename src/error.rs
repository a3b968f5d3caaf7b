//! Crate-wide error type. The web layer maps each variant to an HTTP status.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// Any sqlx failure, flattened to its message.
    #[error("database error: {0}")]
    Database(String),

    /// Blob storage or config file access.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad credentials or an inactive account.
    #[error("authentication error: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    Permission(String),

    /// Input rejected before touching storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// The payload names the missing resource, e.g. `NotFound("group")`.
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate username or group name.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
