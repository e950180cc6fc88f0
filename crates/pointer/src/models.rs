use crate::hash::ContentHash;
use crate::kind::PointerKind;
use crate::mime::is_image;
use time::OffsetDateTime;
use url::Url;

/// The pointer format version.
///
/// Both versions carry identical fields. v2 exists so that image pointers can
/// evolve separately without breaking v1 readers; a v2 pointer always has an
/// `image/*` mime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerVersion {
    /// `"type": "refile"`
    V1,
    /// `"type": "virtual-image"`
    V2,
}
impl PointerVersion {
    /// The version a new pointer for this mime is written as.
    #[must_use]
    pub fn for_mime(mime: &str) -> Self {
        match is_image(mime) {
            true => PointerVersion::V2,
            false => PointerVersion::V1,
        }
    }

    /// The literal stored in the `type` field.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            PointerVersion::V1 => "refile",
            PointerVersion::V2 => "virtual-image",
        }
    }

    /// The number stored in the `v` field.
    #[must_use]
    pub fn number(&self) -> u8 {
        match self {
            PointerVersion::V1 => 1,
            PointerVersion::V2 => 2,
        }
    }
}

/// OS file attributes captured before the original is deleted, and restored
/// onto the file when it is pulled back.
///
/// Timestamps are milliseconds since the Unix epoch (fractional allowed).
/// Any field may be missing; pulls fall back to "now" and a conservative
/// permission mode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FileMeta {
    pub mode: Option<u32>,
    pub mtime_ms: Option<f64>,
    pub atime_ms: Option<f64>,
}

/// Everything needed to create a pointer except the bits stamped at creation
/// time (version and timestamp).
#[derive(Clone, Debug)]
pub struct NewPointer {
    pub mime: String,
    pub url: Url,
    pub hash: ContentHash,
    pub size: u64,
    pub name: String,
    pub backend: Option<String>,
    pub meta: Option<FileMeta>,
}

/// A validated pointer.
///
/// Constructed either by [`Pointer::create`] or by decoding a pointer file
/// (see [`codec`](crate::codec)); in both cases every field invariant holds.
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub version: PointerVersion,
    pub mime: String,
    pub url: Url,
    pub hash: ContentHash,
    pub size: u64,
    /// File name of the original, without directories.
    pub name: String,
    pub created_at: OffsetDateTime,
    /// Id of the backend the content was uploaded to. Older pointers may not
    /// record one, in which case the configured default backend is used.
    pub backend: Option<String>,
    pub meta: Option<FileMeta>,
}
impl Pointer {
    /// Create a pointer, choosing the version from the mime and stamping the
    /// creation time (millisecond precision, like the timestamps written by
    /// other pointer producers).
    #[must_use]
    pub fn create(params: NewPointer) -> Self {
        let now = OffsetDateTime::now_utc();
        let created_at = now.replace_nanosecond(u32::from(now.millisecond()) * 1_000_000).unwrap_or(now);
        Self {
            version: PointerVersion::for_mime(&params.mime),
            mime: params.mime,
            url: params.url,
            hash: params.hash,
            size: params.size,
            name: params.name,
            created_at,
            backend: params.backend,
            meta: params.meta,
        }
    }

    /// The pointer flavour (and therefore file extension) for this pointer's
    /// mime.
    #[must_use]
    pub fn kind(&self) -> PointerKind {
        PointerKind::for_mime(&self.mime)
    }

    /// Whether two pointers reference the same stored content, ignoring the
    /// creation timestamp and captured metadata.
    #[must_use]
    pub fn same_content(&self, other: &Pointer) -> bool {
        self.version == other.version
            && self.mime == other.mime
            && self.url == other.url
            && self.hash == other.hash
            && self.size == other.size
            && self.name == other.name
            && self.backend == other.backend
    }

    /// Re-label a v1 image pointer as v2. Every other field is carried over
    /// untouched.
    #[must_use]
    pub(crate) fn into_v2(self) -> Self {
        Self { version: PointerVersion::V2, ..self }
    }
}
