//! File management module for groupvault.
//!
//! This module provides the upload pipeline building blocks:
//! - Intake validation (extension denylist, ZIP inspection, size ceiling)
//! - Quota resolution with user → group → default precedence
//! - File metadata management
//! - Blob storage with UUID naming

pub mod intake;
mod metadata;
pub mod quota;
mod storage;

pub use intake::{validate_blocking, IntakeError, IntakeValidator};
pub use metadata::{ApprovalState, FileMetadata, FileRepository, NewFile};
pub use quota::{effective_ceiling, QuotaError, QuotaResolver, QuotaSource, QuotaUsage};
pub use storage::FileStorage;

/// Maximum length for an original filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length for a file description (in characters).
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
