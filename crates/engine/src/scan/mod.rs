//! Listing folders and volumes.
//!
//! A folder scan lists one directory (not recursively) the way a file browser
//! would: subdirectories first, alphabetically, then files from largest to
//! smallest. A volume scan walks whole volumes and lists only files, largest
//! first, to find what is worth virtualizing.
//!
//! Pointer files are reported with the size and mime of the file they stand
//! for, and are handed back so the caller can index them.

pub mod error;
mod walk;

pub(crate) use self::walk::{Listing, scan_folder, scan_volumes};
use serde::Serialize;
use std::cmp::Reverse;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Mime reported for directories.
pub const DIRECTORY_MIME: &str = "inode/directory";

/// One entry found by a scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanItem {
    pub path: PathBuf,
    /// For pointers, the size of the virtualized file.
    pub size: u64,
    /// For pointers, the mime of the virtualized file.
    pub mime: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
    pub is_virtualized: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_directory: bool,
}

/// Directories alphabetically, then files by descending size.
pub(crate) fn sort_folder(items: &mut [ScanItem]) {
    items.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, true) => a.path.cmp(&b.path),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (false, false) => b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)),
    });
}

/// Files by descending size.
pub(crate) fn sort_volume(items: &mut [ScanItem]) {
    items.sort_by_key(|item| (Reverse(item.size), item.path.clone()));
}
