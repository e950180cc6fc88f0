//! Error types for the [`push`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use crate::report::FailureKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A push error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for push operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single file could not be pushed. In every case the original file is
/// still in place.
///
/// Variants without a payload wrap the underlying storage, pointer or I/O
/// error as a child frame.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("refusing to touch system path: {}", _0.display())]
    Excluded(#[error(not(source))] PathBuf),
    #[display("already a pointer file")]
    AlreadyVirtualized,
    #[display("not a regular file")]
    NotAFile,
    /// Something already occupies the path the pointer would be written to.
    #[display("pointer path already exists: {}", _0.display())]
    PointerExists(#[error(not(source))] PathBuf),
    #[display("could not read file")]
    Read,
    #[display("upload failed")]
    Upload,
    /// The backend answered, and doesn't have the object.
    #[display("backend could not confirm the upload")]
    Unverified,
    /// The backend's verification hook itself failed.
    #[display("upload verification failed")]
    Verify,
    #[display("could not write pointer")]
    WritePointer,
    /// The pointer read back from disk isn't the pointer that was written.
    #[display("pointer did not survive a read back")]
    PointerMismatch,
    #[display("could not remove original")]
    RemoveOriginal,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read | Self::Upload | Self::Verify | Self::WritePointer | Self::RemoveOriginal)
    }

    pub(crate) fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Excluded(_) => FailureKind::Safety,
            Self::AlreadyVirtualized | Self::NotAFile | Self::PointerExists(_) => FailureKind::Validation,
            Self::Upload | Self::Verify => FailureKind::Transport,
            Self::Unverified | Self::PointerMismatch => FailureKind::Integrity,
            Self::Read | Self::WritePointer | Self::RemoveOriginal => FailureKind::Io,
        }
    }
}
