use url::Url;

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    /// Where the uploaded content can be fetched from again.
    pub url: Url,
}

/// Outcome of asking a backend to confirm an uploaded object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verification {
    /// The backend confirmed the object is stored.
    Confirmed,
    /// The backend answered, and the object isn't there.
    Missing,
    /// The backend has no way to confirm an upload.
    #[default]
    Unsupported,
}
impl Verification {
    /// Whether it is safe to treat the upload as durable. Backends without a
    /// verification hook are trusted on their upload response.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Verification::Missing)
    }
}
