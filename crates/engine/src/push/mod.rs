//! Replacing files by pointers.
//!
//! Files are pushed strictly one after the other, each one fully buffered:
//! hash, upload, verify, write the pointer, read it back, and only then
//! delete the original. See [`push_file`](file::push_file) for the per-file
//! protocol, and [`Engine::push`](crate::Engine::push) for the entry point.

pub mod error;
mod file;

pub(crate) use self::file::{OnDisk, push_file};
use crate::Context;
use crate::progress::{Progress, Reporter};
use crate::report::{BatchReport, FileError, PushReport, describe};
use refile_storage::BackendHandle;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub(crate) async fn push_all(
    paths: &[PathBuf],
    backend: &BackendHandle,
    ctx: &Context<'_>,
    token: &CancellationToken,
    progress: &Reporter,
) -> PushReport {
    let mut report = PushReport::default();
    for path in paths {
        if token.is_cancelled() {
            progress.emit(Progress::Cancelled { path: path.clone() });
            report.record_cancelled(FileError::cancelled(path));
            continue;
        }
        match push_file(path, backend, &OnDisk, ctx.exclusions, progress).await {
            Ok(pushed) => {
                // The pointer is on disk and the original is gone: the push
                // stands even if the bookkeeping below fails.
                if let Err(e) = ctx.registry.add_entries([pushed.entry]).await {
                    tracing::warn!(path = %path.display(), error = %*e, "Pushed file not indexed");
                }
                if let Err(e) = ctx.stats.add(1, pushed.file.size).await {
                    tracing::warn!(path = %path.display(), error = %*e, "Stats not updated");
                }
                progress.emit(Progress::Done { path: path.clone() });
                report.pushed += 1;
                report.saved_bytes = report.saved_bytes.saturating_add(pushed.file.size);
                report.files.push(pushed.file);
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %*e, "Push failed");
                let message = describe(e.frame());
                progress.emit(Progress::Failed { path: path.clone(), message: message.clone() });
                report.record_failure(FileError::new(path, e.failure_kind(), message));
            },
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FailureKind;
    use crate::safety::Exclusions;
    use refile_config::StatsStore;
    use refile_registry::Registry;
    use refile_storage::backend::MockBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancelled_token_skips_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("registry.json")).await.unwrap();
        let stats = StatsStore::open(dir.path().join("stats.json")).await.unwrap();
        let exclusions = Exclusions::default();
        let ctx = Context { registry: &registry, stats: &stats, exclusions: &exclusions };
        let paths = vec![dir.path().join("a.bin"), dir.path().join("b.bin")];
        for path in &paths {
            std::fs::write(path, b"data").unwrap();
        }
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let token = CancellationToken::new();
        token.cancel();

        let report = push_all(&paths, &backend, &ctx, &token, &Reporter::default()).await;
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.pushed, 0);
        assert!(report.errors.iter().all(|e| e.kind == FailureKind::Cancelled));
        assert!(paths.iter().all(|p| p.exists()));
    }
}
