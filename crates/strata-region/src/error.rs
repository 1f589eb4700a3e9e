//! Region store error types.

use std::path::PathBuf;

use crate::rle::RleError;

/// Errors that can occur when reading or writing region files and world files.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the region magic bytes.
    #[error("invalid region magic in {0}")]
    InvalidMagic(PathBuf),

    /// The file was written by a newer format version.
    #[error("unsupported region format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version byte found in the header.
        found: u8,
        /// Highest version this build reads.
        supported: u8,
    },

    /// The offset table or a record points outside the file.
    #[error("corrupted region file {path}: {reason}")]
    Corrupted {
        /// File that failed validation.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// A compressed payload failed to decode.
    #[error("failed to decompress chunk payload: {0}")]
    Rle(#[from] RleError),

    /// A JSON world file failed to parse or serialize.
    #[error("world file error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegionError {
    /// Returns `true` for errors caused by file contents rather than the
    /// environment; these must never be silently replaced by regeneration.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, RegionError::Io(_))
    }
}
