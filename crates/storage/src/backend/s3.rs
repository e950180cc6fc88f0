//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and
//! others. Objects are addressed by `s3://bucket/key` URLs.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the backend configuration entry
//! (`keyId` and `keySecret`).

use crate::StorageBackend;
use crate::backend::{content_digest, object_name};
use crate::error::{ErrorKind, Result};
use crate::models::{Upload, Verification};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::SdkError,
    operation::{get_object::GetObjectError, head_object::HeadObjectError},
    primitives::ByteStream,
};
use exn::{OptionExt, ResultExt};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Uploads are whole files held in memory, so keep concurrency modest.
const DEFAULT_CONCURRENT_REQUESTS: usize = 8;

/// S3-compatible storage backend.
///
/// Stores objects in a bucket, optionally under a key prefix.
///
/// # Examples
///
/// ```no_run
/// use refile_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "archive",
///     "my-bucket",
///     Some("refile/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - The backend id (used in pointer files and logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "refile-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Map an `s3://` URL back to a key in this backend's bucket.
    fn key_for_url(&self, url: &Url) -> Result<String> {
        key_from_url(&self.bucket, url).ok_or_raise(|| ErrorKind::ForeignUrl(url.to_string()))
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(level = "debug", skip(self, data), fields(backend = %self.name, bytes = data.len()))]
    async fn upload(&self, data: Vec<u8>, file_name: &str, mime: &str) -> Result<Upload> {
        let key = object_key(self.prefix.as_deref(), &content_digest(&data), &object_name(file_name));
        let url = object_url(&self.bucket, &key)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime)
            .body(ByteStream::from(data))
            .send()
            .await
            .or_raise(|| ErrorKind::Network(url.to_string()))?;
        Ok(Upload { url })
    }

    async fn verify(&self, url: &Url) -> Result<Verification> {
        let key = self.key_for_url(url)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(Verification::Confirmed),
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadObjectError::NotFound(_)) => {
                Ok(Verification::Missing)
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::Network(url.to_string())),
        }
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let key = self.key_for_url(url)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if matches!(e.err(), GetObjectError::NoSuchKey(_)) => {
                exn::bail!(ErrorKind::NotFound(url.to_string()))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Network(url.to_string())),
        };
        let body = output.body.collect().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }
}

/// `{prefix}/{digest}/{name}`, prefix optional.
fn object_key(prefix: Option<&str>, digest: &str, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{digest}/{name}", prefix.trim_end_matches('/')),
        None => format!("{digest}/{name}"),
    }
}

fn object_url(bucket: &str, key: &str) -> Result<Url> {
    let mut url = Url::parse("s3://bucket/").or_raise(|| ErrorKind::BackendError("invalid S3 URL".to_string()))?;
    url.set_host(Some(bucket)).or_raise(|| ErrorKind::InvalidConfig(format!("invalid bucket name `{bucket}`")))?;
    url.path_segments_mut()
        .map_err(|()| ErrorKind::BackendError("invalid S3 URL".to_string()))?
        .clear()
        .extend(key.split('/'));
    Ok(url)
}

fn key_from_url(bucket: &str, url: &Url) -> Option<String> {
    if url.scheme() != "s3" || url.host_str() != Some(bucket) {
        return None;
    }
    let segments: Vec<String> = url
        .path_segments()?
        .map(|segment| urlencoding::decode(segment).ok().map(|s| s.into_owned()))
        .collect::<Option<_>>()?;
    let key = segments.join("/");
    validate_path(&key).ok()?;
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_without_prefix() {
        assert_eq!(object_key(None, "abc", "work.pdf"), "abc/work.pdf");
    }

    #[test]
    fn test_object_key_with_prefix() {
        assert_eq!(object_key(Some("archive"), "abc", "work.pdf"), "archive/abc/work.pdf");
        assert_eq!(object_key(Some("archive/"), "abc", "work.pdf"), "archive/abc/work.pdf");
    }

    #[test]
    fn test_url_round_trip() {
        let url = object_url("my-bucket", "archive/abc/my report.pdf").unwrap();
        assert_eq!(url.scheme(), "s3");
        assert_eq!(url.host_str(), Some("my-bucket"));
        assert_eq!(key_from_url("my-bucket", &url).unwrap(), "archive/abc/my report.pdf");
    }

    #[test]
    fn test_key_with_escaped_characters() {
        let url = object_url("my-bucket", "abc/été+notes.pdf").unwrap();
        assert_eq!(key_from_url("my-bucket", &url).unwrap(), "abc/été+notes.pdf");
        let invalid = Url::parse("s3://my-bucket/abc/%FF.pdf").unwrap();
        assert!(key_from_url("my-bucket", &invalid).is_none());
    }

    #[test]
    fn test_key_from_foreign_url() {
        let url = object_url("my-bucket", "abc/file.pdf").unwrap();
        assert!(key_from_url("other-bucket", &url).is_none());
        assert!(key_from_url("my-bucket", &Url::parse("https://my-bucket/abc/file.pdf").unwrap()).is_none());
    }
}
