//! Reading and writing pointer files.
//!
//! Decoding is a two-step, fail-closed parse: the JSON is first read into a
//! loosely-typed wire struct (known keys strictly typed, unknown keys
//! ignored), then every field is validated into a [`Pointer`]. Anything that
//! doesn't pass is rejected; nothing is coerced.
//!
//! # Migration
//! Older producers wrote every pointer as v1, including images. A v1 pointer
//! found under a `.repic` path with an `image/*` mime is rewritten in place
//! as v2 on first read, so old pointer collections upgrade lazily without a
//! bulk migration pass.

use crate::atomic::write_atomic;
use crate::error::{ErrorKind, Result};
use crate::hash::ContentHash;
use crate::kind::PointerKind;
use crate::mime::is_image;
use crate::models::{FileMeta, Pointer, PointerVersion};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs;
use tracing::instrument;
use url::Url;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePointer {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    v: Option<u64>,
    mime: String,
    url: String,
    hash: String,
    size: u64,
    name: String,
    created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<WireMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mtime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    atime: Option<f64>,
}

impl TryFrom<WirePointer> for Pointer {
    type Error = crate::error::Error;
    fn try_from(wire: WirePointer) -> Result<Self> {
        let version = match (wire.kind.as_str(), wire.v) {
            // Legacy v1 pointers predate the `v` field.
            ("refile", None | Some(1)) => PointerVersion::V1,
            ("virtual-image", Some(2)) => PointerVersion::V2,
            ("refile" | "virtual-image", _) => exn::bail!(ErrorKind::InvalidField("v")),
            _ => exn::bail!(ErrorKind::InvalidField("type")),
        };
        if version == PointerVersion::V2 && !is_image(&wire.mime) {
            exn::bail!(ErrorKind::InvalidField("mime"));
        }
        let hash: ContentHash = wire.hash.parse()?;
        let url = Url::parse(&wire.url).or_raise(|| ErrorKind::InvalidField("url"))?;
        let created_at =
            OffsetDateTime::parse(&wire.created_at, &Rfc3339).or_raise(|| ErrorKind::InvalidField("createdAt"))?;
        if wire.name.is_empty() {
            exn::bail!(ErrorKind::InvalidField("name"));
        }
        Ok(Pointer {
            version,
            mime: wire.mime,
            url,
            hash,
            size: wire.size,
            name: wire.name,
            created_at,
            backend: wire.backend.filter(|b| !b.is_empty()),
            meta: wire.meta.map(|m| FileMeta {
                mode: m.mode,
                mtime_ms: m.mtime,
                atime_ms: m.atime,
            }),
        })
    }
}

impl TryFrom<&Pointer> for WirePointer {
    type Error = crate::error::Error;
    fn try_from(pointer: &Pointer) -> Result<Self> {
        Ok(WirePointer {
            kind: pointer.version.type_tag().to_string(),
            v: Some(u64::from(pointer.version.number())),
            mime: pointer.mime.clone(),
            url: pointer.url.to_string(),
            hash: pointer.hash.to_string(),
            size: pointer.size,
            name: pointer.name.clone(),
            created_at: pointer.created_at.format(&Rfc3339).or_raise(|| ErrorKind::Encode)?,
            backend: pointer.backend.clone(),
            meta: pointer.meta.map(|m| WireMeta {
                mode: m.mode,
                mtime: m.mtime_ms,
                atime: m.atime_ms,
            }),
        })
    }
}

/// Decode pointer JSON without any knowledge of where it was stored.
pub fn decode(bytes: &[u8]) -> Result<Pointer> {
    let wire: WirePointer = serde_json::from_slice(bytes).or_raise(|| ErrorKind::Malformed)?;
    Pointer::try_from(wire)
}

/// Encode a pointer as pretty-printed JSON.
pub fn encode(pointer: &Pointer) -> Result<Vec<u8>> {
    let wire = WirePointer::try_from(pointer)?;
    let mut bytes = serde_json::to_vec_pretty(&wire).or_raise(|| ErrorKind::Encode)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// A pointer read from disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Loaded {
    pub pointer: Pointer,
    /// The file held a legacy v1 image pointer and was upgraded to v2 while
    /// being read.
    pub migrated: bool,
}

/// Read and validate a pointer file, applying the v1 → v2 migration rule.
///
/// Beyond the per-field checks, a pointer stored under `.repic` must be v2.
/// A v1 pointer there with an `image/*` mime is migrated: the file is
/// rewritten as v2 and the v2 value returned. A failed rewrite is logged and
/// otherwise ignored; the caller still gets the v2 value.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load(path: impl AsRef<Path>) -> Result<Loaded> {
    let path = path.as_ref();
    let bytes = fs::read(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
    let pointer = decode(&bytes)?;
    let stored_as_picture = PointerKind::from_path(path) == Some(PointerKind::Picture);
    if !stored_as_picture || pointer.version == PointerVersion::V2 {
        return Ok(Loaded { pointer, migrated: false });
    }
    if !is_image(&pointer.mime) {
        exn::bail!(ErrorKind::Misplaced(path.to_path_buf()));
    }
    let pointer = pointer.into_v2();
    match write(path, &pointer).await {
        Ok(()) => tracing::info!(path = %path.display(), "Migrated legacy image pointer to v2"),
        Err(e) => tracing::warn!(path = %path.display(), error = %*e, "Could not write migrated pointer back to disk"),
    }
    Ok(Loaded { pointer, migrated: true })
}

/// Read a pointer file, failing closed: any I/O, structural or value problem
/// yields `None`.
pub async fn read(path: impl AsRef<Path>) -> Option<Pointer> {
    let path = path.as_ref();
    match load(path).await {
        Ok(loaded) => Some(loaded.pointer),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %*e, "Rejected pointer file");
            None
        },
    }
}

/// Write a pointer file.
///
/// The JSON is written through [`write_atomic`], so a crash mid-write leaves
/// either the old file or the complete new one, never a truncated pointer.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub async fn write(path: impl AsRef<Path>, pointer: &Pointer) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(pointer)?;
    write_atomic(path, bytes).await.map_err(|e| ErrorKind::from_io(e, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;
    use crate::models::NewPointer;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn legacy_v1_image() -> Value {
        json!({
            "type": "refile",
            "mime": "image/png",
            "url": "https://files.example.com/f/123",
            "hash": hash(b"png bytes").to_string(),
            "size": 9,
            "name": "photo.png",
            "createdAt": "2024-03-01T12:00:00.000Z",
        })
    }

    fn new_pointer(mime: &str) -> Pointer {
        Pointer::create(NewPointer {
            mime: mime.to_string(),
            url: Url::parse("https://files.example.com/f/123").unwrap(),
            hash: hash(b"content"),
            size: 7,
            name: "report.pdf".to_string(),
            backend: Some("home".to_string()),
            meta: Some(FileMeta {
                mode: Some(0o640),
                mtime_ms: Some(1_700_000_000_123.5),
                atime_ms: None,
            }),
        })
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf.refile");
        let pointer = new_pointer("application/pdf");
        write(&path, &pointer).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert!(!loaded.migrated);
        assert_eq!(loaded.pointer, pointer);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_written_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg.repic");
        write(&path, &new_pointer("image/jpeg")).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        // Pretty-printed.
        assert!(text.contains("\n  \"type\""));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "virtual-image");
        assert_eq!(value["v"], 2);
        assert_eq!(value["backend"], "home");
        assert_eq!(value["meta"]["mode"], 0o640);
        assert!(value["meta"].get("atime").is_none());
    }

    #[test]
    fn test_decode_accepts_unknown_keys() {
        let mut value = legacy_v1_image();
        value["mime"] = json!("application/pdf");
        value["somethingNew"] = json!({"nested": true});
        let pointer = decode(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(pointer.version, PointerVersion::V1);
        assert_eq!(pointer.backend, None);
    }

    #[rstest]
    #[case("hash", json!("sha256:NOT-HEX"))]
    #[case("hash", json!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"))]
    #[case("url", json!("not a url"))]
    #[case("type", json!("something-else"))]
    #[case("v", json!(2))]
    #[case("createdAt", json!("yesterday"))]
    #[case("name", json!(""))]
    fn test_decode_rejects_invalid_values(#[case] field: &str, #[case] value: Value) {
        let mut doc = legacy_v1_image();
        doc["mime"] = json!("application/pdf");
        doc[field] = value;
        assert!(decode(&serde_json::to_vec(&doc).unwrap()).is_err());
    }

    #[rstest]
    #[case("size", json!(-1))]
    #[case("size", json!("12"))]
    #[case("mime", json!(12))]
    fn test_decode_rejects_wrong_types(#[case] field: &str, #[case] value: Value) {
        let mut doc = legacy_v1_image();
        doc[field] = value;
        let err = decode(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed));
    }

    #[test]
    fn test_decode_rejects_v2_without_image_mime() {
        let mut doc = legacy_v1_image();
        doc["type"] = json!("virtual-image");
        doc["v"] = json!(2);
        doc["mime"] = json!("video/mp4");
        let err = decode(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidField("mime")));
    }

    #[tokio::test]
    async fn test_read_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.refile");
        tokio::fs::write(&path, b"{ this is not json").await.unwrap();
        assert!(read(&path).await.is_none());
        assert!(read(dir.path().join("missing.refile")).await.is_none());
    }

    #[tokio::test]
    async fn test_legacy_image_migrates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png.repic");
        tokio::fs::write(&path, serde_json::to_vec(&legacy_v1_image()).unwrap()).await.unwrap();

        let first = load(&path).await.unwrap();
        assert!(first.migrated);
        assert_eq!(first.pointer.version, PointerVersion::V2);
        // The file on disk is now valid v2 JSON...
        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["type"], "virtual-image");
        assert_eq!(on_disk["v"], 2);
        // ...so the second read is a plain read with the same logical content.
        let second = load(&path).await.unwrap();
        assert!(!second.migrated);
        assert_eq!(second.pointer, first.pointer);
    }

    #[tokio::test]
    async fn test_legacy_image_outside_repic_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png.refile");
        let original = serde_json::to_vec(&legacy_v1_image()).unwrap();
        tokio::fs::write(&path, &original).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert!(!loaded.migrated);
        assert_eq!(loaded.pointer.version, PointerVersion::V1);
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_non_image_v1_in_repic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thing.repic");
        let mut doc = legacy_v1_image();
        doc["mime"] = json!("application/pdf");
        tokio::fs::write(&path, serde_json::to_vec(&doc).unwrap()).await.unwrap();
        let err = load(&path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Misplaced(_)));
        assert!(read(&path).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_migration_survives_failed_write_back() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png.repic");
        tokio::fs::write(&path, serde_json::to_vec(&legacy_v1_image()).unwrap()).await.unwrap();
        // Read-only directory: the temp file for the rewrite can't be created.
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
        let loaded = load(&path).await;
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        // Running as root ignores directory permissions; only assert the
        // caller-visible behaviour, which holds either way.
        let loaded = loaded.unwrap();
        assert!(loaded.migrated);
        assert_eq!(loaded.pointer.version, PointerVersion::V2);
    }
}
