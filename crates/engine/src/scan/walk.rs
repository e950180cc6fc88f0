use crate::safety::Exclusions;
use crate::scan::error::{ErrorKind, Result};
use crate::scan::{DIRECTORY_MIME, ScanItem, sort_folder, sort_volume};
use refile_pointer::mime::mime_for_path;
use refile_pointer::{is_pointer_path, normalize_path};
use refile_registry::RegistryEntry;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// What a scan found: the items to report, and the pointers among them in
/// registry form.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    pub items: Vec<ScanItem>,
    pub pointers: Vec<RegistryEntry>,
    /// The scan stopped early; `items` holds what was found until then.
    pub cancelled: bool,
}

pub(crate) async fn scan_folder(root: &Path, exclusions: &Exclusions, token: &CancellationToken) -> Result<Listing> {
    let root = normalize_path(root);
    if exclusions.is_protected(&root).await {
        exn::bail!(ErrorKind::Excluded(root));
    }
    let mut listing = Listing::default();
    visit(&root, exclusions, token, &mut listing, true)
        .await
        .map_err(|e| {
            tracing::debug!(path = %root.display(), error = %e, "Could not read scan root");
            ErrorKind::ReadDir(root.clone())
        })?;
    sort_folder(&mut listing.items);
    Ok(listing)
}

/// Walk every root recursively. Unreadable directories, including roots, are
/// skipped.
pub(crate) async fn scan_volumes(roots: &[PathBuf], exclusions: &Exclusions, token: &CancellationToken) -> Listing {
    let mut listing = Listing::default();
    let mut pending: Vec<PathBuf> = roots.iter().rev().map(normalize_path).collect();
    while let Some(dir) = pending.pop() {
        if listing.cancelled {
            break;
        }
        if exclusions.is_protected(&dir).await {
            tracing::debug!(path = %dir.display(), "Skipping protected directory");
            continue;
        }
        match visit(&dir, exclusions, token, &mut listing, false).await {
            Ok(subdirs) => pending.extend(subdirs),
            Err(e) => tracing::debug!(path = %dir.display(), error = %e, "Skipping unreadable directory"),
        }
    }
    sort_volume(&mut listing.items);
    listing
}

/// List the entries directly inside `dir` into `listing`, returning the
/// subdirectories found. Symlinks are never followed.
async fn visit(
    dir: &Path,
    exclusions: &Exclusions,
    token: &CancellationToken,
    listing: &mut Listing,
    include_dirs: bool,
) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let resolved = fs::canonicalize(dir).await.ok();
    let mut subdirs = Vec::new();
    loop {
        if token.is_cancelled() {
            listing.cancelled = true;
            break;
        }
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "Directory listing interrupted");
                break;
            },
        };
        let path = entry.path();
        if exclusions.is_excluded(&path)
            || resolved.as_ref().is_some_and(|r| exclusions.is_excluded(r.join(entry.file_name())))
        {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if metadata.is_dir() {
            if include_dirs {
                listing.items.push(directory_item(path.clone(), &metadata));
            }
            subdirs.push(path);
        } else if metadata.is_file() {
            let (item, pointer) = file_item(path, &metadata).await;
            listing.items.push(item);
            listing.pointers.extend(pointer);
        }
    }
    Ok(subdirs)
}

fn directory_item(path: PathBuf, metadata: &Metadata) -> ScanItem {
    ScanItem {
        path,
        size: 0,
        mime: DIRECTORY_MIME.to_string(),
        modified: modified(metadata),
        is_virtualized: false,
        is_directory: true,
    }
}

async fn file_item(path: PathBuf, metadata: &Metadata) -> (ScanItem, Option<RegistryEntry>) {
    if is_pointer_path(&path)
        && let Some(pointer) = refile_pointer::read(&path).await
    {
        let entry = RegistryEntry::from_pointer(&path, &pointer);
        let item = ScanItem {
            path,
            size: pointer.size,
            mime: pointer.mime,
            modified: modified(metadata),
            is_virtualized: true,
            is_directory: false,
        };
        return (item, Some(entry));
    }
    let item = ScanItem {
        mime: mime_for_path(&path).to_string(),
        path,
        size: metadata.len(),
        modified: modified(metadata),
        is_virtualized: false,
        is_directory: false,
    };
    (item, None)
}

fn modified(metadata: &Metadata) -> Option<OffsetDateTime> {
    metadata.modified().ok().map(OffsetDateTime::from)
}
