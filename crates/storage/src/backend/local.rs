//! Local filesystem storage backend.
//!
//! Treats a directory (usually a NAS or external drive mount) as remote
//! storage. Objects are stored under a content-derived key and addressed by
//! `file://` URLs that must resolve inside the configured root.

use crate::StorageBackend;
use crate::backend::{content_digest, object_name};
use crate::error::{ErrorKind, Result};
use crate::models::{Upload, Verification};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tempfile::NamedTempFile;
use url::Url;

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use refile_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("nas", "/mnt/nas/refile")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Root directory objects are stored under
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it only happens once when the backend is
            // constructed and it's not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a relative object key.
    fn absolute_path(&self, key: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(key.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Map a `file://` URL back to an absolute path inside the root.
    fn path_for_url(&self, url: &Url) -> Result<PathBuf> {
        if url.scheme() != "file" {
            exn::bail!(ErrorKind::ForeignUrl(url.to_string()));
        }
        let absolute = url.to_file_path().map_err(|()| ErrorKind::ForeignUrl(url.to_string()))?;
        let relative =
            absolute.strip_prefix(&self.root).or_raise(|| ErrorKind::ForeignUrl(url.to_string()))?.to_path_buf();
        // Re-validating rejects `..` segments that would climb back out.
        self.absolute_path(relative)
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Write via a temp file in the object's directory, synced and then
    /// renamed, so a reader never sees a partially written object.
    async fn write_atomic(path: &Path, data: Vec<u8>) -> std::io::Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let dir = path.parent().ok_or_else(|| std::io::Error::other("object path has no parent"))?;
            let mut temp = NamedTempFile::new_in(dir)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&path).map_err(|e| e.error)?;
            Ok::<_, std::io::Error>(())
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(level = "debug", skip(self, data), fields(backend = %self.name, bytes = data.len()))]
    async fn upload(&self, data: Vec<u8>, file_name: &str, _mime: &str) -> Result<Upload> {
        let digest = content_digest(&data);
        let key = PathBuf::from(&digest[..2]).join(&digest).join(object_name(file_name));
        let path = self.absolute_path(&key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        Self::write_atomic(&path, data).await.map_err(|e| Self::map_io_error(e, &path))?;
        let url = Url::from_file_path(&path).map_err(|()| ErrorKind::InvalidPath(path.clone()))?;
        Ok(Upload { url })
    }

    async fn verify(&self, url: &Url) -> Result<Verification> {
        let path = self.path_for_url(url)?;
        match fs::try_exists(&path).await.map_err(ErrorKind::Io)? {
            true => Ok(Verification::Confirmed),
            false => Ok(Verification::Missing),
        }
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let path = self.path_for_url(url)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }
}
