//! Turning pointers back into files.
//!
//! The mirror image of [`push`](crate::push): download, check the hash,
//! write the file, restore its metadata, and only then delete the pointer.

pub mod error;
mod file;

pub(crate) use self::file::pull_file;
use crate::Context;
use crate::progress::{Progress, Reporter};
use crate::report::{BatchReport, FileError, PullReport, describe};
use refile_storage::BackendRegistry;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub(crate) async fn pull_all(
    pointer_paths: &[PathBuf],
    backends: &BackendRegistry,
    ctx: &Context<'_>,
    token: &CancellationToken,
    progress: &Reporter,
) -> PullReport {
    let mut report = PullReport::default();
    for path in pointer_paths {
        if token.is_cancelled() {
            progress.emit(Progress::Cancelled { path: path.clone() });
            report.record_cancelled(FileError::cancelled(path));
            continue;
        }
        match pull_file(path, backends, ctx.exclusions, progress).await {
            Ok(pulled) => {
                if let Err(e) = ctx.registry.remove_entries([&pulled.pointer_path]).await {
                    tracing::warn!(path = %path.display(), error = %*e, "Pulled file still indexed");
                }
                if let Err(e) = ctx.stats.subtract(1, pulled.size).await {
                    tracing::warn!(path = %path.display(), error = %*e, "Stats not updated");
                }
                progress.emit(Progress::Done { path: path.clone() });
                report.pulled += 1;
                report.restored_bytes = report.restored_bytes.saturating_add(pulled.size);
                report.files.push(pulled);
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %*e, "Pull failed");
                let message = describe(e.frame());
                progress.emit(Progress::Failed { path: path.clone(), message: message.clone() });
                report.record_failure(FileError::new(path, e.failure_kind(), message));
            },
        }
    }
    report
}
