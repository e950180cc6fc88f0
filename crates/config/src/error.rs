//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Underlying I/O error while reading or writing a document
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A document on disk isn't valid JSON for its schema
    #[display("malformed document: {}", _0.display())]
    Malformed(#[error(not(source))] PathBuf),
    /// A value could not be serialized
    #[display("could not serialize document")]
    Serialize,
    /// The configuration was rejected as a whole
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// Settings could not be extracted from their sources
    #[display("invalid settings: {_0}")]
    Settings(#[error(not(source))] String),
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
}
