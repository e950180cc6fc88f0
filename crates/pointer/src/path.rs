use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: make it absolute against the current
/// directory, drop `.` components and resolve `..` without touching the
/// filesystem (symlinks are not followed).
///
/// Used wherever two spellings of the same path need to compare equal, such
/// as registry keys and watch folder ids.
///
/// ```
/// use std::path::Path;
/// use refile_pointer::normalize_path;
///
/// assert_eq!(normalize_path("/data/./videos/../report.pdf"), Path::new("/data/report.pdf"));
/// assert_eq!(normalize_path("/data//videos/"), Path::new("/data/videos"));
/// ```
#[must_use]
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {},
            // Popping past the root leaves the root in place, same as the OS.
            Component::ParentDir => {
                normalized.pop();
            },
            other => normalized.push(other),
        }
    }
    normalized
}
