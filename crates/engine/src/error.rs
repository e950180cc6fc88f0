//! Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only operations that fail as a whole return these. Push and pull never do:
//! their per-file failures are collected into a report instead (see
//! [`FileError`](crate::FileError)).

use derive_more::{Display, Error};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the subsystem that failed.
///
/// ### Operational Errors
/// - [`ErrorKind::Scan`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Config`]
/// - [`ErrorKind::Registry`]
/// - [`ErrorKind::Stats`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading, validating or saving the backend configuration failed.
    #[display("backend configuration error")]
    Config,
    /// Opening or updating the registry failed.
    #[display("registry error")]
    Registry,
    /// Opening or updating the stats document failed.
    #[display("stats error")]
    Stats,
    /// A folder or volume scan failed.
    #[display("scan failed")]
    Scan,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Registry | Self::Stats)
    }
}
