use serde::Serialize;
use std::path::PathBuf;

/// Message of the single error in a batch aborted for lack of a backend.
pub const NO_BACKEND_CONFIGURED: &str = "No backend configured";

/// Coarse classification of a per-file failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// No usable backend: nothing configured, unknown id, invalid config.
    Configuration,
    /// The input isn't something the operation accepts.
    Validation,
    /// The path is protected by the system path denylist.
    Safety,
    /// Content or pointer didn't match what was expected.
    Integrity,
    /// The backend couldn't be reached or refused the request.
    Transport,
    Io,
    /// The session was cancelled before this file was started.
    Cancelled,
}

/// One file that didn't make it, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    /// `None` for failures that concern the whole batch.
    pub path: Option<PathBuf>,
    pub kind: FailureKind,
    pub message: String,
}
impl FileError {
    pub(crate) fn new(path: impl Into<PathBuf>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FailureKind::Cancelled, "cancelled")
    }
}

/// One line for a report: the error, then each cause below it.
pub(crate) fn describe(frame: &exn::Frame) -> String {
    let mut message = frame.to_string();
    let mut causes = frame.children();
    while let Some(cause) = causes.first() {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        causes = cause.children();
    }
    message
}

/// A file successfully replaced by a pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushedFile {
    pub path: PathBuf,
    pub pointer_path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Bytes freed on disk (sum of the pushed files' sizes).
    pub saved_bytes: u64,
    pub files: Vec<PushedFile>,
    pub errors: Vec<FileError>,
}

/// A pointer successfully turned back into its file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulledFile {
    pub pointer_path: PathBuf,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub pulled: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Bytes written back to disk.
    pub restored_bytes: u64,
    pub files: Vec<PulledFile>,
    pub errors: Vec<FileError>,
}

/// Shared bookkeeping for both report types.
pub(crate) trait BatchReport: Default {
    fn record_failure(&mut self, error: FileError);
    fn record_cancelled(&mut self, error: FileError);

    /// A batch that never started: every file counts as failed, with a
    /// single batch-level error.
    fn aborted(total: usize, kind: FailureKind, message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.record_failure(FileError {
            path: None,
            kind,
            message: message.into(),
        });
        report.set_failed(total);
        report
    }

    fn set_failed(&mut self, failed: usize);
}
impl BatchReport for PushReport {
    fn record_failure(&mut self, error: FileError) {
        self.failed += 1;
        self.errors.push(error);
    }

    fn record_cancelled(&mut self, error: FileError) {
        self.cancelled += 1;
        self.errors.push(error);
    }

    fn set_failed(&mut self, failed: usize) {
        self.failed = failed;
    }
}
impl BatchReport for PullReport {
    fn record_failure(&mut self, error: FileError) {
        self.failed += 1;
        self.errors.push(error);
    }

    fn record_cancelled(&mut self, error: FileError) {
        self.cancelled += 1;
        self.errors.push(error);
    }

    fn set_failed(&mut self, failed: usize) {
        self.failed = failed;
    }
}
