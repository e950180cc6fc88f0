//! Content hashing.
//!
//! Every pointer records the SHA-256 of exactly the bytes that were uploaded,
//! written as `sha256:` followed by 64 lowercase hex characters. The same
//! representation is used to verify downloaded bytes before anything is
//! written back to disk.

use crate::error::{Error, ErrorKind, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Prefix naming the algorithm in the textual form of a [`ContentHash`].
pub const HASH_PREFIX: &str = "sha256:";
const READ_CHUNK_SIZE: usize = 1024 * 1024;

static HASH_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^sha256:[0-9a-f]{64}$").unwrap());

/// A validated `sha256:<hex>` content hash.
///
/// The only ways to get one are hashing bytes ([`hash`], [`hash_file`]) or
/// parsing a string that matches the pattern exactly, so holding a
/// `ContentHash` means the pattern invariant holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);
impl ContentHash {
    fn from_digest(digest: impl AsRef<[u8]>) -> Self {
        Self(format!("{HASH_PREFIX}{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare hex digest, without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0[HASH_PREFIX.len()..]
    }
}
impl FromStr for ContentHash {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if !HASH_REGEX.is_match(s) {
            exn::bail!(ErrorKind::InvalidField("hash"));
        }
        Ok(Self(s.to_string()))
    }
}
impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| serde::de::Error::custom("expected sha256:<64 lowercase hex>"))
    }
}

/// Hash a byte buffer.
pub fn hash(bytes: impl AsRef<[u8]>) -> ContentHash {
    ContentHash::from_digest(Sha256::digest(bytes.as_ref()))
}

/// Recompute the hash of `bytes` and compare it with `expected`.
pub fn verify(bytes: impl AsRef<[u8]>, expected: &ContentHash) -> bool {
    hash(bytes) == *expected
}

/// Hash a file on disk without holding its full contents in memory.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn hash_file(path: impl AsRef<Path>) -> Result<ContentHash> {
    let path = path.as_ref();
    let mut file = tokio::fs::File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await.map_err(ErrorKind::Io)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(ContentHash::from_digest(hasher.finalize()))
}
