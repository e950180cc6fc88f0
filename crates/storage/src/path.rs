//! Object key validation.
//!
//! Backends that map keys onto a filesystem or a bucket validate every key
//! with [`validate`] so that nothing derived from a file name or a URL can
//! escape the storage root.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Resolve an object key relative to the storage root.
///
/// `.` segments and repeated separators disappear, and `..` may be used as
/// long as it never rises above the root. Windows drive prefixes, NUL bytes
/// and keys that resolve to nothing are refused with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// ```
/// use std::path::Path;
/// use refile_storage::validate_path;
///
/// assert_eq!(validate_path("ab/./abcdef//report.pdf").unwrap(), Path::new("ab/abcdef/report.pdf"));
/// assert_eq!(validate_path("tmp/../ab/report.pdf").unwrap(), Path::new("ab/report.pdf"));
/// assert!(validate_path("ab/../../outside.pdf").is_err());
/// assert!(validate_path("nul\0byte").is_err());
/// assert!(validate_path("./").is_err());
/// ```
pub fn validate(key: impl AsRef<Path>) -> Result<PathBuf> {
    let key = key.as_ref();
    let invalid = || ErrorKind::InvalidPath(key.to_path_buf());
    let mut resolved: Vec<&OsStr> = Vec::new();
    for component in key.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(segment) => resolved.push(segment),
            Component::ParentDir => {
                resolved.pop().ok_or_raise(invalid)?;
            },
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::CurDir | Component::RootDir => {},
        }
    }
    if resolved.is_empty() {
        exn::bail!(invalid());
    }
    Ok(resolved.into_iter().collect())
}
