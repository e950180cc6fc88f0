//! Error types for the [`pull`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use crate::report::FailureKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A pull error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pull operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single pointer could not be pulled. Unless stated otherwise, the
/// pointer is still in place and nothing was written.
///
/// Variants without a payload wrap the underlying storage, pointer or I/O
/// error as a child frame.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("refusing to touch system path: {}", _0.display())]
    Excluded(#[error(not(source))] PathBuf),
    #[display("not a pointer file")]
    NotAPointer,
    #[display("invalid pointer")]
    InvalidPointer,
    /// A file already exists where the pointer would be restored to.
    #[display("restore target already exists: {}", _0.display())]
    TargetExists(#[error(not(source))] PathBuf),
    /// The pointer's backend (or the default) can't be used.
    #[display("no usable backend")]
    Backend,
    #[display("download failed")]
    Download,
    /// The downloaded content doesn't hash to what the pointer recorded.
    #[display("downloaded content does not match the pointer hash")]
    HashMismatch,
    #[display("could not write restored file")]
    Write,
    /// The file was restored, but its pointer could not be deleted.
    #[display("file restored, but the pointer could not be removed")]
    RemovePointer,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download | Self::Write)
    }

    pub(crate) fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Excluded(_) => FailureKind::Safety,
            Self::NotAPointer | Self::InvalidPointer | Self::TargetExists(_) => FailureKind::Validation,
            Self::Backend => FailureKind::Configuration,
            Self::Download => FailureKind::Transport,
            Self::HashMismatch => FailureKind::Integrity,
            Self::Write | Self::RemovePointer => FailureKind::Io,
        }
    }
}
