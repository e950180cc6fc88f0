//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for storing virtualized file content across different backends
//! (self-hosted HTTP endpoints, local or network directories, S3-compatible
//! services, etc.).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;
mod self_hosted;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
pub use self::self_hosted::SelfHostedBackend;
use crate::BackendHandle;
use crate::config::BackendConfig;
use crate::error::Result;
use crate::models::{Upload, Verification};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Unified interface for storage backends.
///
/// A backend stores opaque blobs and hands back a URL for each one. The URL
/// is recorded in the pointer file, so it must stay resolvable by the same
/// backend for as long as the pointer exists.
///
/// # Examples
///
/// ```
/// use refile_storage::{StorageBackend, error::Result};
///
/// async fn round_trip(backend: &dyn StorageBackend, data: Vec<u8>) -> Result<bool> {
///     let upload = backend.upload(data.clone(), "notes.txt", "text/plain").await?;
///     Ok(backend.download(&upload.url).await? == data)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (the id it is configured under). Used
    /// in pointer files to find the backend again, and for logging.
    fn name(&self) -> &str;

    /// Store `data` and return the URL it can be fetched from.
    ///
    /// `file_name` and `mime` are informational; backends may use them to
    /// build a readable object key or set a content type, but must not
    /// depend on them being unique.
    async fn upload(&self, data: Vec<u8>, file_name: &str, mime: &str) -> Result<Upload>;

    /// Confirm that a previously uploaded object is durably stored.
    ///
    /// The default implementation reports [`Verification::Unsupported`], for
    /// backends that have no cheap way of checking.
    async fn verify(&self, url: &Url) -> Result<Verification> {
        _ = url;
        Ok(Verification::Unsupported)
    }

    /// Fetch the complete content behind `url`.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// no longer exists.
    async fn download(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Construct a backend from its configuration entry.
///
/// The entry is validated first. A variant whose support isn't compiled into
/// this build (the `s3` feature) is an
/// [`Unavailable`](crate::error::ErrorKind::Unavailable) error.
#[tracing::instrument(level = "debug", skip(config), fields(kind = config.kind()))]
pub async fn create_backend(name: &str, config: &BackendConfig) -> Result<BackendHandle> {
    config.validate()?;
    let backend: BackendHandle = match config {
        BackendConfig::SelfHosted { endpoint, api_key } => {
            Arc::new(SelfHostedBackend::new(name, endpoint.clone(), api_key.clone())?)
        },
        BackendConfig::Local { root } => Arc::new(LocalBackend::new(name, root)?),
        #[cfg(feature = "s3")]
        BackendConfig::S3 { bucket, region, key_id, key_secret, prefix, endpoint } => Arc::new(
            S3Backend::new(name, bucket, prefix.clone(), region, endpoint.clone(), key_id, key_secret).await?,
        ),
        #[cfg(not(feature = "s3"))]
        BackendConfig::S3 { .. } => exn::bail!(crate::error::ErrorKind::Unavailable("s3")),
    };
    Ok(backend)
}

/// Reduce a file name to something safe to embed in an object key: the last
/// path component only, with separators and control characters replaced.
pub(crate) fn object_name(file_name: &str) -> String {
    let last = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String =
        last.chars().map(|c| if c.is_control() || c == ':' { '_' } else { c }).collect::<String>().trim().to_string();
    match cleaned.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => cleaned,
    }
}

/// Content-derived prefix for object keys, so identical names never collide.
pub(crate) fn content_digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
