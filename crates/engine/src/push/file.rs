use crate::metadata;
use crate::progress::{Phase, Reporter};
use crate::push::error::{ErrorKind, Result};
use crate::report::PushedFile;
use crate::safety::Exclusions;
use exn::{OptionExt, ResultExt};
use refile_pointer::mime::mime_for_path;
use refile_pointer::{NewPointer, Pointer, hash, is_pointer_path, normalize_path, pointer_path_for};
use refile_registry::RegistryEntry;
use refile_storage::{BackendHandle, Verification};
use std::path::Path;
use tokio::fs;

/// A file replaced by its pointer. Indexing it is left to the caller.
#[derive(Debug)]
pub(crate) struct Pushed {
    pub file: PushedFile,
    pub entry: RegistryEntry,
}

/// Where pointer files get written. Push only trusts the pointer it reads
/// back afterwards, whoever wrote it.
pub(crate) trait PointerWriter {
    async fn write(&self, path: &Path, pointer: &Pointer) -> refile_pointer::error::Result<()>;
}

/// Writes pointers next to the file with [`refile_pointer::write`].
pub(crate) struct OnDisk;
impl PointerWriter for OnDisk {
    async fn write(&self, path: &Path, pointer: &Pointer) -> refile_pointer::error::Result<()> {
        refile_pointer::write(path, pointer).await
    }
}

/// Replace one file by a pointer.
///
/// The original is deleted only once the pointer has been written and read
/// back intact; every earlier failure leaves it untouched. If deleting the
/// original fails, the pointer is removed again.
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.display(), backend = backend.name()))]
pub(crate) async fn push_file(
    path: &Path,
    backend: &BackendHandle,
    pointers: &impl PointerWriter,
    exclusions: &Exclusions,
    progress: &Reporter,
) -> Result<Pushed> {
    let path = normalize_path(path);
    if exclusions.is_protected(&path).await {
        exn::bail!(ErrorKind::Excluded(path));
    }
    if is_pointer_path(&path) {
        exn::bail!(ErrorKind::AlreadyVirtualized);
    }
    let stat = fs::symlink_metadata(&path).await.or_raise(|| ErrorKind::Read)?;
    if !stat.is_file() {
        exn::bail!(ErrorKind::NotAFile);
    }
    let mime = mime_for_path(&path);
    let pointer_path = pointer_path_for(&path, mime);
    if fs::try_exists(&pointer_path).await.unwrap_or(true) {
        exn::bail!(ErrorKind::PointerExists(pointer_path));
    }
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).ok_or_raise(|| ErrorKind::Read)?;

    progress.phase(&path, Phase::Hashing);
    let meta = metadata::capture(&stat);
    let data = fs::read(&path).await.or_raise(|| ErrorKind::Read)?;
    let hash = hash::hash(&data);
    let size = data.len() as u64;

    progress.phase(&path, Phase::Uploading);
    let upload = backend.upload(data, &name, mime).await.or_raise(|| ErrorKind::Upload)?;

    progress.phase(&path, Phase::Verifying);
    match backend.verify(&upload.url).await.or_raise(|| ErrorKind::Verify)? {
        Verification::Missing => exn::bail!(ErrorKind::Unverified),
        Verification::Confirmed | Verification::Unsupported => {},
    }

    progress.phase(&path, Phase::WritingPointer);
    let pointer = Pointer::create(NewPointer {
        mime: mime.to_string(),
        url: upload.url,
        hash,
        size,
        name,
        backend: Some(backend.name().to_string()),
        meta: Some(meta),
    });
    pointers.write(&pointer_path, &pointer).await.or_raise(|| ErrorKind::WritePointer)?;
    confirm_pointer(&pointer_path, &pointer).await?;

    if let Err(e) = fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "Could not remove original, rolling back pointer");
        _ = fs::remove_file(&pointer_path).await;
        return Err(e).or_raise(|| ErrorKind::RemoveOriginal);
    }
    tracing::info!(path = %path.display(), pointer = %pointer_path.display(), size, "Pushed");
    Ok(Pushed {
        entry: RegistryEntry::from_pointer(&pointer_path, &pointer),
        file: PushedFile { path, pointer_path, size },
    })
}

/// Read the pointer back and check it is the one that was written. On any
/// mismatch the pointer file is removed.
pub(crate) async fn confirm_pointer(pointer_path: &Path, expected: &Pointer) -> Result<()> {
    let intact = match refile_pointer::load(pointer_path).await {
        Ok(loaded) => {
            let found = loaded.pointer;
            found.version == expected.version
                && found.hash == expected.hash
                && found.size == expected.size
                && found.url == expected.url
        },
        Err(e) => {
            tracing::debug!(path = %pointer_path.display(), error = %*e, "Pointer read back failed");
            false
        },
    };
    if !intact {
        tracing::warn!(path = %pointer_path.display(), "Pointer did not validate after writing, removing it");
        _ = fs::remove_file(pointer_path).await;
        exn::bail!(ErrorKind::PointerMismatch);
    }
    Ok(())
}
