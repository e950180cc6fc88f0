//! Error types for the [`scan`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A scan error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a scan could not run at all. Entries that can't be read mid-scan are
/// skipped rather than failing the scan.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The scan root is a protected system path.
    #[display("refusing to scan system path: {}", _0.display())]
    Excluded(#[error(not(source))] PathBuf),
    /// The scan root could not be listed.
    #[display("could not read directory: {}", _0.display())]
    ReadDir(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadDir(_))
    }
}
