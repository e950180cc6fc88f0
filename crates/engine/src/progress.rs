use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

/// Where a file currently is in its push or pull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Hashing,
    Uploading,
    Verifying,
    WritingPointer,
    Downloading,
    Restoring,
}

/// Progress events emitted during a push or pull.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once, with the number of files.
/// 2. For each file, zero or more [`Phase`](Self::Phase) events followed by
///    exactly one of [`Done`](Self::Done), [`Failed`](Self::Failed) or
///    [`Cancelled`](Self::Cancelled).
/// 3. [`Finished`](Self::Finished) exactly once.
///
/// A batch aborted before it started (no backend configured) emits only
/// `Started` and `Finished`.
#[derive(Clone, Debug, PartialEq)]
pub enum Progress {
    Started { total: usize },
    Phase { path: PathBuf, phase: Phase },
    Done { path: PathBuf },
    Failed { path: PathBuf, message: String },
    Cancelled { path: PathBuf },
    Finished,
}

/// Sending half handed to [`push`](crate::Engine::push) and
/// [`pull`](crate::Engine::pull).
pub type ProgressSender = UnboundedSender<Progress>;

/// Emits progress to an optional listener. A listener that went away is not
/// an error.
#[derive(Clone, Debug, Default)]
pub(crate) struct Reporter(Option<ProgressSender>);
impl Reporter {
    pub(crate) fn new(sender: Option<ProgressSender>) -> Self {
        Self(sender)
    }

    pub(crate) fn emit(&self, event: Progress) {
        if let Some(sender) = &self.0 {
            _ = sender.send(event);
        }
    }

    pub(crate) fn phase(&self, path: &Path, phase: Phase) {
        tracing::debug!(path = %path.display(), ?phase, "Phase");
        self.emit(Progress::Phase { path: path.to_path_buf(), phase });
    }
}
