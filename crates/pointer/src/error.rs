//! Pointer Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A pointer error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pointer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The pointer file does not exist.
    #[display("pointer file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Underlying I/O error while reading or writing a pointer.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The document isn't JSON, or doesn't have the pointer shape.
    #[display("malformed pointer document")]
    Malformed,
    /// The document has the pointer shape, but a known field holds an
    /// invalid value (bad hash pattern, non-URL, wrong type literal...).
    #[display("invalid pointer field: {_0}")]
    InvalidField(#[error(not(source))] &'static str),
    /// A valid pointer stored under an extension that doesn't allow its
    /// version (for example a v1 pointer saved as `.repic`).
    #[display("pointer version does not match its extension: {}", _0.display())]
    Misplaced(#[error(not(source))] PathBuf),
    /// Serializing a pointer to JSON failed.
    #[display("could not encode pointer")]
    Encode,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    pub(crate) fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            _ => Self::Io(err),
        }
    }
}
