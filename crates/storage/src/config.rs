//! Backend configuration entries.
//!
//! A closed, tagged schema: the `type` key selects the variant and anything
//! else is rejected while parsing, before any backend is constructed.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use url::Url;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BackendConfig {
    /// An HTTP endpoint speaking the refile upload protocol.
    SelfHosted { endpoint: Url, api_key: String },
    /// A directory (typically a NAS mount) used as remote storage.
    Local { root: PathBuf },
    /// An S3-compatible bucket.
    S3 {
        bucket: String,
        region: String,
        key_id: String,
        key_secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}
impl BackendConfig {
    /// The `type` tag of this entry.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::SelfHosted { .. } => "self-hosted",
            BackendConfig::Local { .. } => "local",
            BackendConfig::S3 { .. } => "s3",
        }
    }

    /// Check the values that the type system can't.
    pub fn validate(&self) -> Result<()> {
        match self {
            BackendConfig::SelfHosted { endpoint, api_key } => {
                if !matches!(endpoint.scheme(), "http" | "https") {
                    exn::bail!(ErrorKind::InvalidConfig(format!("endpoint must be http(s), got `{endpoint}`")));
                }
                if api_key.trim().is_empty() {
                    exn::bail!(ErrorKind::InvalidConfig("apiKey must not be empty".to_string()));
                }
            },
            BackendConfig::Local { root } => {
                if !root.is_absolute() {
                    exn::bail!(ErrorKind::InvalidConfig(format!("root must be absolute, got `{}`", root.display())));
                }
            },
            BackendConfig::S3 { bucket, region, key_id, key_secret, .. } => {
                for (field, value) in [("bucket", bucket), ("region", region), ("keyId", key_id), ("keySecret", key_secret)]
                {
                    if value.trim().is_empty() {
                        exn::bail!(ErrorKind::InvalidConfig(format!("{field} must not be empty")));
                    }
                }
            },
        }
        Ok(())
    }
}
// Hand-written so secrets never end up in logs.
impl Debug for BackendConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BackendConfig::SelfHosted { endpoint, .. } => {
                f.debug_struct("SelfHosted").field("endpoint", &endpoint.as_str()).finish_non_exhaustive()
            },
            BackendConfig::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            BackendConfig::S3 { bucket, region, prefix, endpoint, .. } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("region", region)
                .field("prefix", prefix)
                .field("endpoint", endpoint)
                .finish_non_exhaustive(),
        }
    }
}
