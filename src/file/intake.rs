//! Upload intake checks: extension denylist, ZIP inspection and size ceiling.
//!
//! ZIP archives are opened from memory and every entry name is checked
//! against the denylist. Entries that are themselves `.zip` files are
//! decompressed and inspected the same way, down to [`MAX_ARCHIVE_DEPTH`]
//! levels. All nested archives of one upload share a decompression budget of
//! [`MAX_INFLATED_BYTES`].

use std::io::{Cursor, Read};

use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::settings::StorageSettings;

/// Deepest accepted archive nesting; the uploaded archive itself is level 1.
pub const MAX_ARCHIVE_DEPTH: usize = 8;

/// Largest nested archive that will be decompressed for inspection.
pub const MAX_NESTED_ARCHIVE_BYTES: u64 = 64 * 1024 * 1024;

/// Total bytes decompressed while inspecting one upload.
pub const MAX_INFLATED_BYTES: u64 = 128 * 1024 * 1024;

/// Reasons an upload is refused before it reaches storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("extension not allowed: .{extension}")]
    ExtensionNotAllowed { extension: String },

    #[error("archive contains a file with a forbidden extension: {entry}")]
    ArchiveContainsDeniedEntry { entry: String },

    #[error("archive nesting deeper than {MAX_ARCHIVE_DEPTH} levels")]
    ArchiveTooDeep,

    #[error("invalid zip archive: {0}")]
    InvalidArchive(String),

    #[error("file exceeds the maximum size of {max_kb} KB")]
    FileTooLarge { max_kb: u64 },
}

impl From<ZipError> for IntakeError {
    fn from(e: ZipError) -> Self {
        IntakeError::InvalidArchive(e.to_string())
    }
}

/// Lowercased text after the last `.` of the final path component.
///
/// Both `/` and `\` count as separators. A name with no dot, or ending in a
/// dot, has no extension.
pub fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// `true` if `size` rounded up to KB is above `max_bytes` rounded up to KB.
pub fn exceeds_kb_ceiling(size: u64, max_bytes: u64) -> bool {
    size.div_ceil(1024) > max_bytes.div_ceil(1024)
}

/// Applies the upload policy in [`StorageSettings`] to incoming files.
pub struct IntakeValidator<'a> {
    settings: &'a StorageSettings,
}

impl<'a> IntakeValidator<'a> {
    pub fn new(settings: &'a StorageSettings) -> Self {
        Self { settings }
    }

    fn max_file_size(&self) -> u64 {
        self.settings.max_file_size.max(0) as u64
    }

    /// Check the declared name. Returns the normalized extension, if any.
    pub fn check_name(&self, original_name: &str) -> Result<Option<String>, IntakeError> {
        let ext = extension_of(original_name);
        if let Some(ref e) = ext {
            if self.settings.is_banned(e) {
                return Err(IntakeError::ExtensionNotAllowed {
                    extension: e.clone(),
                });
            }
        }
        Ok(ext)
    }

    /// Apply the KB-rounded per-file ceiling.
    pub fn check_size(&self, size: u64) -> Result<(), IntakeError> {
        let max = self.max_file_size();
        if exceeds_kb_ceiling(size, max) {
            return Err(IntakeError::FileTooLarge {
                max_kb: max.div_ceil(1024),
            });
        }
        Ok(())
    }

    /// Inspect the file body. Only ZIP archives have anything to inspect.
    pub fn check_contents(&self, ext: Option<&str>, bytes: &[u8]) -> Result<(), IntakeError> {
        if ext == Some("zip") {
            let mut budget = MAX_INFLATED_BYTES;
            self.inspect_archive(bytes, 1, &mut budget)?;
        }
        Ok(())
    }

    /// Run every check on a fully-read upload.
    pub fn validate(&self, original_name: &str, bytes: &[u8]) -> Result<Option<String>, IntakeError> {
        let ext = self.check_name(original_name)?;
        self.check_size(bytes.len() as u64)?;
        self.check_contents(ext.as_deref(), bytes)?;
        Ok(ext)
    }

    fn inspect_archive(
        &self,
        bytes: &[u8],
        depth: usize,
        budget: &mut u64,
    ) -> Result<(), IntakeError> {
        if depth > MAX_ARCHIVE_DEPTH {
            return Err(IntakeError::ArchiveTooDeep);
        }

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        for i in 0..archive.len() {
            // Raw access reads the header only, so encrypted entries still
            // expose their names.
            let (name, is_dir) = {
                let entry = archive.by_index_raw(i)?;
                (entry.name().to_string(), entry.is_dir())
            };
            if is_dir {
                continue;
            }

            let Some(ext) = extension_of(&name) else {
                continue;
            };
            if self.settings.is_banned(&ext) {
                return Err(IntakeError::ArchiveContainsDeniedEntry { entry: name });
            }

            if ext == "zip" {
                let inner = read_nested(&mut archive, i, &name, budget)?;
                self.inspect_archive(&inner, depth + 1, budget)?;
            }
        }

        Ok(())
    }
}

/// Run [`IntakeValidator::validate`] on the blocking pool, since archive
/// inspection is CPU bound. The body is handed back for storage.
pub async fn validate_blocking(
    settings: StorageSettings,
    original_name: String,
    bytes: Vec<u8>,
) -> Result<(Option<String>, Vec<u8>), IntakeError> {
    tokio::task::spawn_blocking(move || {
        IntakeValidator::new(&settings)
            .validate(&original_name, &bytes)
            .map(|ext| (ext, bytes))
    })
    .await
    .map_err(|e| IntakeError::InvalidArchive(format!("inspection aborted: {e}")))?
}

/// Inflate a nested archive, charging its size to `budget`.
fn read_nested(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    index: usize,
    name: &str,
    budget: &mut u64,
) -> Result<Vec<u8>, IntakeError> {
    let limit = MAX_NESTED_ARCHIVE_BYTES.min(*budget);
    let entry = archive.by_index(index)?;
    let mut inner = Vec::new();
    entry
        .take(limit + 1)
        .read_to_end(&mut inner)
        .map_err(|e| IntakeError::InvalidArchive(format!("{name}: {e}")))?;

    let len = inner.len() as u64;
    if len > limit {
        let reason = if *budget < MAX_NESTED_ARCHIVE_BYTES {
            "archive expands beyond the inspection limit"
        } else {
            "nested archive too large to inspect"
        };
        return Err(IntakeError::InvalidArchive(format!("{name}: {reason}")));
    }
    *budget -= len;
    Ok(inner)
}
