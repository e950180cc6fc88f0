//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The remote object does not exist
    #[display("object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (connection refused, timeouts, TLS...)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The URL doesn't belong to this backend (wrong scheme, host or root)
    #[display("URL not handled by this backend: {_0}")]
    ForeignUrl(#[error(not(source))] String),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
    /// A backend configuration entry is invalid
    #[display("invalid backend configuration: {_0}")]
    InvalidConfig(#[error(not(source))] String),
    /// The backend type is known, but support for it was not compiled in
    #[display("backend type `{_0}` is not available in this build")]
    Unavailable(#[error(not(source))] &'static str),
    /// No backend is configured at all
    #[display("no backend configured")]
    NotConfigured,
    /// A backend id was requested that isn't configured
    #[display("backend not found: {_0}")]
    UnknownBackend(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::BackendError(_))
    }

    /// Returns `true` if the error was caused by configuration rather than by
    /// the remote side.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_) | Self::Unavailable(_) | Self::NotConfigured | Self::UnknownBackend(_)
        )
    }
}
