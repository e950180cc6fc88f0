//! Error types for the [`watch`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A watch error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for watch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The watch state document could not be read.
    #[display("could not load watch state")]
    Load,
    /// The watch state document could not be written. The in-memory state is
    /// left unchanged.
    #[display("could not persist watch state")]
    Persist,
    /// The folder can't be watched (missing, not a directory, or excluded).
    #[display("cannot watch folder: {}", _0.display())]
    InvalidFolder(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persist)
    }
}
