//! Extension-based mime detection and the coarse categories used for stats.
//!
//! Files are classified by name only; nothing here opens a file. Unknown
//! extensions fall back to [`OCTET_STREAM`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess a mime type from the path's extension (case-insensitive).
#[must_use]
pub fn mime_for_path(path: impl AsRef<Path>) -> &'static str {
    mime_guess::from_path(path).first_raw().unwrap_or(OCTET_STREAM)
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

pub fn is_audio(mime: &str) -> bool {
    mime.starts_with("audio/")
}

pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Coarse grouping of mime types, used for registry statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    Video,
    Image,
    Audio,
    Archive,
    Document,
    Other,
}
impl MimeCategory {
    pub const ALL: [MimeCategory; 6] = [
        MimeCategory::Video,
        MimeCategory::Image,
        MimeCategory::Audio,
        MimeCategory::Archive,
        MimeCategory::Document,
        MimeCategory::Other,
    ];

    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        if is_video(mime) {
            return MimeCategory::Video;
        }
        if is_image(mime) {
            return MimeCategory::Image;
        }
        if is_audio(mime) {
            return MimeCategory::Audio;
        }
        const ARCHIVES: [&str; 9] = ["zip", "7z", "rar", "tar", "gzip", "bzip", "xz", "zstd", "diskimage"];
        const DOCUMENTS: [&str; 6] = ["pdf", "msword", "officedocument", "ms-", "opendocument", "epub"];
        // Documents first: `application/epub+zip` is a book, not an archive.
        if mime.starts_with("text/") || (mime.starts_with("application/") && DOCUMENTS.iter().any(|d| mime.contains(d)))
        {
            return MimeCategory::Document;
        }
        if mime.starts_with("application/") && (ARCHIVES.iter().any(|a| mime.contains(a)) || mime.contains("iso9660"))
        {
            return MimeCategory::Archive;
        }
        MimeCategory::Other
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeCategory::Video => "video",
            MimeCategory::Image => "image",
            MimeCategory::Audio => "audio",
            MimeCategory::Archive => "archive",
            MimeCategory::Document => "document",
            MimeCategory::Other => "other",
        }
    }
}
impl Display for MimeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
