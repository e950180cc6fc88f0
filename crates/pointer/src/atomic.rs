//! Crash-safe file writes.

use std::ffi::OsString;
use std::io::{Error as IoError, Result as IoResult, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;

/// Write `bytes` to `path` so that readers only ever see the old content or
/// all of the new content.
///
/// The data goes to a hidden `.name.*.partial` sibling first, which is synced
/// and then renamed over `path`. The sibling is removed if anything fails.
pub async fn write_atomic(path: impl Into<PathBuf>, bytes: Vec<u8>) -> IoResult<()> {
    let path = path.into();
    tokio::task::spawn_blocking(move || write_blocking(&path, &bytes))
        .await
        .map_err(IoError::other)?
}

fn write_blocking(path: &Path, bytes: &[u8]) -> IoResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    prefix.push(path.file_name().unwrap_or_default());
    prefix.push(".");
    let mut builder = Builder::new();
    builder.prefix(&prefix).suffix(".partial");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let mut temp = builder.tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
