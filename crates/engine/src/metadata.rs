//! Capturing file metadata before a push and putting it back after a pull.

use filetime::FileTime;
use refile_pointer::FileMeta;
use std::fs::Metadata;
use std::io::Result as IoResult;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Mode given to restored files whose pointer didn't record one.
pub const DEFAULT_MODE: u32 = 0o644;

pub fn capture(metadata: &Metadata) -> FileMeta {
    FileMeta {
        mode: mode_of(metadata),
        mtime_ms: metadata.modified().ok().and_then(to_millis),
        atime_ms: metadata.accessed().ok().and_then(to_millis),
    }
}

/// Apply captured metadata to a restored file. Missing timestamps fall back
/// to now, a missing mode to [`DEFAULT_MODE`].
pub async fn restore(path: &Path, meta: Option<FileMeta>) -> IoResult<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || restore_blocking(&path, meta.unwrap_or_default()))
        .await
        .map_err(std::io::Error::other)?
}

fn restore_blocking(path: &Path, meta: FileMeta) -> IoResult<()> {
    let now = FileTime::now();
    let mtime = meta.mtime_ms.and_then(from_millis).unwrap_or(now);
    let atime = meta.atime_ms.and_then(from_millis).unwrap_or(now);
    set_mode(path, meta.mode.unwrap_or(DEFAULT_MODE))?;
    filetime::set_file_times(path, atime, mtime)
}

fn to_millis(time: SystemTime) -> Option<f64> {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => Some(since.as_secs_f64() * 1000.0),
        Err(before) => Some(-(before.duration().as_secs_f64() * 1000.0)),
    }
}

fn from_millis(ms: f64) -> Option<FileTime> {
    if !ms.is_finite() {
        return None;
    }
    let secs = (ms / 1000.0).floor();
    let nanos = ((ms - secs * 1000.0) * 1_000_000.0).round().clamp(0.0, 999_999_999.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let time = FileTime::from_unix_time(secs as i64, nanos as u32);
    Some(time)
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_metadata: &Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> IoResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
}

// Only the read-only bit exists here; it maps to "no write bit for anyone".
#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> IoResult<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    std::fs::set_permissions(path, permissions)
}
