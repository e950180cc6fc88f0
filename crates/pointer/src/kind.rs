use crate::mime::{is_audio, is_image, is_video};
use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

/// The closed set of pointer file flavours, one per extension.
///
/// The extension is chosen from the mime of the original file when it is
/// virtualized; the JSON inside is the same shape for all four (see
/// [`PointerVersion`](crate::PointerVersion) for the format split).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// `.revid`
    Video,
    /// `.remusic`
    Music,
    /// `.repic`
    Picture,
    /// `.refile`
    File,
}

const ALL_KINDS: [PointerKind; 4] = [PointerKind::Video, PointerKind::Music, PointerKind::Picture, PointerKind::File];

impl PointerKind {
    /// Choose the pointer flavour for a mime type. Total: anything that isn't
    /// video, audio or an image is a generic `.refile`.
    #[must_use]
    pub fn for_mime(mime: &str) -> Self {
        if is_video(mime) {
            PointerKind::Video
        } else if is_audio(mime) {
            PointerKind::Music
        } else if is_image(mime) {
            PointerKind::Picture
        } else {
            PointerKind::File
        }
    }

    /// Detect the pointer flavour from a path's final extension.
    ///
    /// The match is case-sensitive: `photo.jpg.REPIC` is not a pointer.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        ALL_KINDS.into_iter().find(|kind| &kind.extension()[1..] == ext)
    }

    /// Returns the file extension (including the leading dot).
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            PointerKind::Video => ".revid",
            PointerKind::Music => ".remusic",
            PointerKind::Picture => ".repic",
            PointerKind::File => ".refile",
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerKind::Video => "video",
            PointerKind::Music => "music",
            PointerKind::Picture => "picture",
            PointerKind::File => "file",
        }
    }
}
impl Display for PointerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Map a mime type to the pointer extension it gets, e.g. `video/mp4` to
/// `.revid`.
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    PointerKind::for_mime(mime).extension()
}

/// Whether the path ends in one of the four pointer extensions.
#[must_use]
pub fn is_pointer_path(path: impl AsRef<Path>) -> bool {
    PointerKind::from_path(path).is_some()
}

/// The path a pointer restores to: the pointer path with its pointer
/// extension stripped. Paths that aren't pointers are returned unchanged.
#[must_use]
pub fn original_path_for(pointer_path: impl AsRef<Path>) -> PathBuf {
    let pointer_path = pointer_path.as_ref();
    match PointerKind::from_path(pointer_path) {
        Some(_) => pointer_path.with_extension(""),
        None => pointer_path.to_path_buf(),
    }
}

/// The path a pointer for `original_path` is written to: the original path
/// with the mime's pointer extension appended (`report.pdf` becomes
/// `report.pdf.refile`).
#[must_use]
pub fn pointer_path_for(original_path: impl AsRef<Path>, mime: &str) -> PathBuf {
    let mut path = OsString::from(original_path.as_ref().as_os_str());
    path.push(extension_for_mime(mime));
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("video/mp4", ".revid")]
    #[case("video/x-matroska", ".revid")]
    #[case("audio/mpeg", ".remusic")]
    #[case("image/png", ".repic")]
    #[case("image/svg+xml", ".repic")]
    #[case("application/pdf", ".refile")]
    #[case("application/octet-stream", ".refile")]
    #[case("", ".refile")]
    #[case("videogame/cartridge", ".refile")]
    fn test_extension_for_mime(#[case] mime: &str, #[case] expected: &str) {
        assert_eq!(extension_for_mime(mime), expected);
    }

    #[rstest]
    #[case("a/movie.mkv.revid", Some(PointerKind::Video))]
    #[case("song.mp3.remusic", Some(PointerKind::Music))]
    #[case("photo.jpg.repic", Some(PointerKind::Picture))]
    #[case("report.pdf.refile", Some(PointerKind::File))]
    #[case("report.pdf", None)]
    #[case("photo.jpg.REPIC", None)]
    #[case(".refile", None)]
    #[case("refile", None)]
    fn test_from_path(#[case] path: &str, #[case] expected: Option<PointerKind>) {
        assert_eq!(PointerKind::from_path(path), expected);
        assert_eq!(is_pointer_path(path), expected.is_some());
    }

    #[rstest]
    #[case("/data/report.pdf.refile", "/data/report.pdf")]
    #[case("/data/photo.jpg.repic", "/data/photo.jpg")]
    #[case("/data/archive.refile", "/data/archive")]
    #[case("/data/report.pdf", "/data/report.pdf")]
    fn test_original_path_for(#[case] pointer: &str, #[case] expected: &str) {
        assert_eq!(original_path_for(pointer), PathBuf::from(expected));
    }

    #[rstest]
    #[case("/data/report.pdf", "application/pdf", "/data/report.pdf.refile")]
    #[case("/data/photo.jpg", "image/jpeg", "/data/photo.jpg.repic")]
    #[case("/data/movie.mkv", "video/x-matroska", "/data/movie.mkv.revid")]
    #[case("/data/no-extension", "application/octet-stream", "/data/no-extension.refile")]
    fn test_pointer_path_for(#[case] original: &str, #[case] mime: &str, #[case] expected: &str) {
        let pointer = pointer_path_for(original, mime);
        assert_eq!(pointer, PathBuf::from(expected));
        assert_eq!(original_path_for(&pointer), PathBuf::from(original));
    }
}
