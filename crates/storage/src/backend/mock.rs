//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::backend::object_name;
use crate::error::{ErrorKind, Result};
use crate::models::{Upload, Verification};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use url::Url;

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. The
/// failure knobs can be flipped at any time, including after the backend has
/// been handed out as a [`BackendHandle`](crate::BackendHandle).
///
/// # Examples
///
/// ```
/// use refile_storage::backend::MockBackend;
/// use refile_storage::StorageBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default();
/// let upload = backend.upload(b"data...".to_vec(), "file.bin", "application/octet-stream").await?;
/// assert_eq!(backend.download(&upload.url).await?, b"data...");
///
/// backend.set_reject_uploads(true);
/// assert!(backend.upload(b"more".to_vec(), "file.bin", "application/octet-stream").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<Url, Vec<u8>>>,
    counter: AtomicUsize,
    verifies: AtomicBool,
    reject_uploads: AtomicBool,
    fail_verification: AtomicBool,
    corrupt_downloads: AtomicBool,
}

impl MockBackend {
    /// Change the name of the mock backend.
    ///
    /// # Example
    ///
    /// ```
    /// use refile_storage::backend::MockBackend;
    ///
    /// let backend = MockBackend::default().with_name("test");
    /// ```
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Behave like a backend without a verification hook.
    pub fn without_verification(self) -> Self {
        self.verifies.store(false, Ordering::SeqCst);
        self
    }

    /// Make every upload fail with a backend error.
    pub fn set_reject_uploads(&self, reject: bool) {
        self.reject_uploads.store(reject, Ordering::SeqCst);
    }

    /// Make verification report uploads as missing.
    pub fn set_fail_verification(&self, fail: bool) {
        self.fail_verification.store(fail, Ordering::SeqCst);
    }

    /// Flip a byte in every download, so the content no longer matches its
    /// hash.
    pub fn set_corrupt_downloads(&self, corrupt: bool) {
        self.corrupt_downloads.store(corrupt, Ordering::SeqCst);
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Raw stored content, bypassing the failure knobs.
    pub async fn get(&self, url: &Url) -> Option<Vec<u8>> {
        self.storage.read().await.get(url).cloned()
    }

    /// Drop an object, simulating remote data loss.
    pub async fn remove(&self, url: &Url) -> bool {
        self.storage.write().await.remove(url).is_some()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            storage: RwLock::default(),
            counter: AtomicUsize::new(0),
            verifies: AtomicBool::new(true),
            reject_uploads: AtomicBool::new(false),
            fail_verification: AtomicBool::new(false),
            corrupt_downloads: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, data: Vec<u8>, file_name: &str, _mime: &str) -> Result<Upload> {
        if self.reject_uploads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError(format!("{} rejected the upload", self.name)));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut url = Url::parse("mock://objects/").map_err(|e| ErrorKind::BackendError(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ErrorKind::BackendError("mock URL cannot have a path".to_string()))?
            .clear()
            .push(&self.name)
            .push(&id.to_string())
            .push(&object_name(file_name));
        self.storage.write().await.insert(url.clone(), data);
        Ok(Upload { url })
    }

    async fn verify(&self, url: &Url) -> Result<Verification> {
        if !self.verifies.load(Ordering::SeqCst) {
            return Ok(Verification::Unsupported);
        }
        if self.fail_verification.load(Ordering::SeqCst) {
            return Ok(Verification::Missing);
        }
        match self.storage.read().await.contains_key(url) {
            true => Ok(Verification::Confirmed),
            false => Ok(Verification::Missing),
        }
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let mut data = self.get(url).await.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(url.to_string())))?;
        if self.corrupt_downloads.load(Ordering::SeqCst) {
            match data.first_mut() {
                Some(first) => *first ^= 0xFF,
                None => data.push(0),
            }
        }
        Ok(data)
    }
}
