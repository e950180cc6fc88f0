use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

/// A single JSON document on disk, owned by exactly one store.
///
/// A missing file loads as `T::default()`. Saves are atomic: the JSON is
/// written to a temporary file in the same directory, synced, and then
/// renamed over the document, so readers see either the old or the new
/// content.
#[derive(Clone, Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}
impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<T> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Malformed(self.path.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(ErrorKind::Io(e).into()),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(path = %self.path.display()))]
    pub async fn save(&self, value: &T) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(value).or_raise(|| ErrorKind::Serialize)?;
        bytes.push(b'\n');
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .or_raise(|| ErrorKind::Io(std::io::Error::other("document writer task failed")))?
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    // Keep the temporary file next to the document so the final rename never
    // crosses a filesystem boundary.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(ErrorKind::Io)?;
    let mut temp = NamedTempFile::new_in(dir).map_err(ErrorKind::Io)?;
    temp.write_all(bytes).map_err(ErrorKind::Io)?;
    temp.flush().map_err(ErrorKind::Io)?;
    temp.as_file_mut().sync_all().map_err(ErrorKind::Io)?;
    temp.persist(path).map_err(|e| ErrorKind::Io(e.error))?;
    Ok(())
}
