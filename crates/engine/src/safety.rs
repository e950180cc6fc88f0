//! System path exclusion.
//!
//! Operating system directories, trash folders and anything the user listed
//! in `extra_excluded_paths` are never scanned, pushed or pulled. Temporary
//! directories (`/tmp`, `/var/folders`) are allowed.
//!
//! A path is checked both as written and as it resolves on disk, so a
//! symlinked directory can't lead into a protected tree.

use refile_pointer::normalize_path;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[cfg(not(windows))]
const SYSTEM_PREFIXES: &[&str] = &[
    "/bin",
    "/boot",
    "/dev",
    "/etc",
    "/lib",
    "/lib64",
    "/proc",
    "/sbin",
    "/sys",
    "/usr",
    "/var/lib",
    "/var/log",
    "/System",
    "/private/etc",
];

#[cfg(windows)]
const SYSTEM_PREFIXES: &[&str] = &[
    r"C:\Windows",
    r"C:\Program Files",
    r"C:\Program Files (x86)",
    r"C:\ProgramData",
];

/// Directory names excluded wherever they appear.
const EXCLUDED_NAMES: &[&str] = &["$Recycle.Bin", ".Trash", ".Trashes", "System Volume Information"];

/// The denylist, plus user-configured extra paths.
#[derive(Clone, Debug, Default)]
pub struct Exclusions {
    extra: Vec<PathBuf>,
}
impl Exclusions {
    /// Extra paths are kept both as given and, when they exist, in their
    /// canonical form.
    pub fn new(extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut paths = Vec::new();
        for path in extra {
            let path = normalize_path(path);
            if let Ok(canonical) = std::fs::canonicalize(&path)
                && canonical != path
            {
                paths.push(canonical);
            }
            paths.push(path);
        }
        Self { extra: paths }
    }

    /// Whether `path` is excluded, as written or once symlinks in it are
    /// resolved.
    pub async fn is_protected(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize_path(path);
        self.is_excluded(&path) || resolve(&path).await.is_some_and(|resolved| self.is_excluded(resolved))
    }

    /// Whether `path` (or any directory containing it) is excluded. Purely
    /// lexical; see [`is_protected`](Self::is_protected).
    #[must_use]
    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize_path(path);
        let in_excluded_dir = path.components().any(|c| match c {
            Component::Normal(name) => EXCLUDED_NAMES.iter().any(|n| names_equal(name.to_str(), n)),
            _ => false,
        });
        if in_excluded_dir {
            return true;
        }
        SYSTEM_PREFIXES.iter().any(|prefix| has_prefix(&path, Path::new(prefix)))
            || self.extra.iter().any(|prefix| has_prefix(&path, prefix))
    }
}

/// The on-disk location of `path`. A path that doesn't exist yet resolves
/// through its parent directory.
async fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path).await {
        return Some(canonical);
    }
    let parent = fs::canonicalize(path.parent()?).await.ok()?;
    Some(parent.join(path.file_name()?))
}

#[cfg(not(windows))]
fn has_prefix(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
}

// Windows paths compare case-insensitively.
#[cfg(windows)]
fn has_prefix(path: &Path, prefix: &Path) -> bool {
    let mut components = path.components();
    prefix.components().all(|p| {
        components
            .next()
            .is_some_and(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case(&p.as_os_str().to_string_lossy()))
    })
}

fn names_equal(name: Option<&str>, excluded: &str) -> bool {
    match name {
        Some(name) if cfg!(windows) => name.eq_ignore_ascii_case(excluded),
        Some(name) => name == excluded,
        None => false,
    }
}
