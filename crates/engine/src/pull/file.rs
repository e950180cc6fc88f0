use crate::metadata;
use crate::progress::{Phase, Reporter};
use crate::pull::error::{ErrorKind, Result};
use crate::report::PulledFile;
use crate::safety::Exclusions;
use exn::ResultExt;
use refile_pointer::{hash, is_pointer_path, normalize_path, original_path_for, write_atomic};
use refile_storage::BackendRegistry;
use std::path::Path;
use tokio::fs;

/// Turn one pointer back into its file.
///
/// Nothing is written unless the downloaded content matches the pointer's
/// hash, and the pointer is deleted only after the restored file is in
/// place.
#[tracing::instrument(level = "debug", skip_all, fields(path = %pointer_path.display()))]
pub(crate) async fn pull_file(
    pointer_path: &Path,
    backends: &BackendRegistry,
    exclusions: &Exclusions,
    progress: &Reporter,
) -> Result<PulledFile> {
    let pointer_path = normalize_path(pointer_path);
    if !is_pointer_path(&pointer_path) {
        exn::bail!(ErrorKind::NotAPointer);
    }
    let path = original_path_for(&pointer_path);
    for protected in [&pointer_path, &path] {
        if exclusions.is_protected(protected).await {
            exn::bail!(ErrorKind::Excluded(protected.clone()));
        }
    }
    let pointer = refile_pointer::load(&pointer_path).await.or_raise(|| ErrorKind::InvalidPointer)?.pointer;
    if fs::try_exists(&path).await.unwrap_or(true) {
        exn::bail!(ErrorKind::TargetExists(path));
    }
    let backend = backends.resolve(pointer.backend.as_deref()).or_raise(|| ErrorKind::Backend)?;

    progress.phase(&pointer_path, Phase::Downloading);
    let data = backend.download(&pointer.url).await.or_raise(|| ErrorKind::Download)?;
    if !hash::verify(&data, &pointer.hash) {
        tracing::warn!(path = %pointer_path.display(), backend = backend.name(), "Downloaded content failed the hash check");
        exn::bail!(ErrorKind::HashMismatch);
    }

    progress.phase(&pointer_path, Phase::Restoring);
    write_atomic(&path, data).await.or_raise(|| ErrorKind::Write)?;
    if let Err(e) = metadata::restore(&path, pointer.meta).await {
        tracing::warn!(path = %path.display(), error = %e, "Could not restore file metadata");
    }
    fs::remove_file(&pointer_path).await.or_raise(|| ErrorKind::RemovePointer)?;
    tracing::info!(path = %path.display(), size = pointer.size, "Pulled");
    Ok(PulledFile {
        pointer_path,
        path,
        size: pointer.size,
    })
}
