mod common;

use common::{MIB, fixture, fixture_with, read_json, unconfigured, write_file};
use filetime::FileTime;
use refile_config::VirtStats;
use refile_engine::{FailureKind, Phase, Progress};

#[tokio::test]
async fn test_push_then_pull_round_trip() {
    let fx = fixture().await;
    let path = fx.files().join("archive.zip");
    let content = write_file(&path, MIB + 17);
    let mtime = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&path, mtime).unwrap();

    let pushed = fx.engine.push(&[path.clone()], None).await;
    assert_eq!(pushed.pushed, 1, "{:?}", pushed.errors);
    let pointer_path = fx.files().join("archive.zip.refile");
    assert_eq!(pushed.files[0].pointer_path, pointer_path);
    assert!(!path.exists());
    assert!(pointer_path.exists());
    assert!(fx.engine.registry().contains(&pointer_path));

    let pulled = fx.engine.pull(&[pointer_path.clone()], None).await;
    assert_eq!(pulled.pulled, 1, "{:?}", pulled.errors);
    assert_eq!(pulled.restored_bytes, MIB + 17);
    assert_eq!(std::fs::read(&path).unwrap(), content);
    assert_eq!(FileTime::from_last_modification_time(&std::fs::metadata(&path).unwrap()), mtime);
    assert!(!pointer_path.exists());
    assert!(fx.engine.registry().is_empty());
    assert_eq!(fx.engine.status().await.unwrap().stats, VirtStats::default());
}

#[tokio::test]
async fn test_pushed_document_becomes_refile_pointer() {
    let fx = fixture().await;
    let path = fx.files().join("report.pdf");
    write_file(&path, 10 * MIB);

    let report = fx.engine.push(&[path.clone()], None).await;
    assert_eq!(report.pushed, 1);
    assert_eq!(report.saved_bytes, 10_485_760);
    assert!(!path.exists());

    let pointer = read_json(&fx.files().join("report.pdf.refile"));
    assert_eq!(pointer["type"], "refile");
    assert_eq!(pointer["v"], 1);
    assert_eq!(pointer["mime"], "application/pdf");
    assert_eq!(pointer["size"], 10_485_760);
    assert_eq!(pointer["name"], "report.pdf");
    assert_eq!(pointer["backend"], "mock");
    let hash = pointer["hash"].as_str().unwrap();
    assert!(hash.starts_with("sha256:"));
    assert_eq!(hash.len(), 7 + 64);

    let status = fx.engine.status().await.unwrap();
    assert_eq!(status.stats, VirtStats { virtualized_files: 1, saved_bytes: 10_485_760 });
    assert_eq!(status.default_backend.as_deref(), Some("mock"));
    assert_eq!(status.session, None);
}

#[tokio::test]
async fn test_pushed_image_becomes_v2_pointer() {
    let fx = fixture().await;
    let path = fx.files().join("photo.jpg");
    write_file(&path, 4096);

    let report = fx.engine.push(&[path], None).await;
    assert_eq!(report.pushed, 1);
    let pointer = read_json(&fx.files().join("photo.jpg.repic"));
    assert_eq!(pointer["type"], "virtual-image");
    assert_eq!(pointer["v"], 2);
    assert_eq!(pointer["mime"], "image/jpeg");
}

#[tokio::test]
async fn test_no_backend_aborts_batch() {
    let (dir, engine) = unconfigured().await;
    let first = dir.path().join("a.bin");
    let second = dir.path().join("b.bin");
    let content = write_file(&first, 100);
    write_file(&second, 100);

    let report = engine.push(&[first.clone(), second], None).await;
    assert_eq!(report.pushed, 0);
    assert_eq!(report.failed, 2);
    let messages: Vec<_> = report.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, ["No backend configured"]);
    assert_eq!(report.errors[0].kind, FailureKind::Configuration);
    assert_eq!(std::fs::read(&first).unwrap(), content);
}

#[tokio::test]
async fn test_pull_with_unknown_backend_keeps_pointer() {
    let fx = fixture().await;
    let path = fx.files().join("song.mp3");
    write_file(&path, 2048);
    fx.engine.push(&[path.clone()], None).await;
    let pointer_path = fx.files().join("song.mp3.remusic");
    let mut pointer = read_json(&pointer_path);
    pointer["backend"] = "gone".into();
    std::fs::write(&pointer_path, serde_json::to_vec_pretty(&pointer).unwrap()).unwrap();
    let before = std::fs::read(&pointer_path).unwrap();

    let report = fx.engine.pull(&[pointer_path.clone()], None).await;
    assert_eq!(report.pulled, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, FailureKind::Configuration);
    assert!(report.errors[0].message.contains("backend not found"), "{}", report.errors[0].message);
    assert_eq!(std::fs::read(&pointer_path).unwrap(), before);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unverified_upload_keeps_original() {
    let fx = fixture().await;
    fx.mock.set_fail_verification(true);
    let path = fx.files().join("movie.mp4");
    let content = write_file(&path, 4096);

    let report = fx.engine.push(&[path.clone()], None).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, FailureKind::Integrity);
    assert_eq!(std::fs::read(&path).unwrap(), content);
    assert!(!fx.files().join("movie.mp4.revid").exists());
    assert!(fx.engine.registry().is_empty());
    assert_eq!(fx.engine.status().await.unwrap().stats, VirtStats::default());
}

#[tokio::test]
async fn test_occupied_pointer_path_keeps_original() {
    let fx = fixture().await;
    let path = fx.files().join("movie.mp4");
    let content = write_file(&path, 4096);
    std::fs::create_dir(fx.files().join("movie.mp4.revid")).unwrap();

    let report = fx.engine.push(&[path.clone()], None).await;
    assert_eq!(report.failed, 1);
    assert_eq!(std::fs::read(&path).unwrap(), content);
    assert!(fx.mock.is_empty().await);
}

#[tokio::test]
async fn test_corrupt_download_is_not_restored() {
    let fx = fixture().await;
    let path = fx.files().join("backup.tar");
    write_file(&path, 8192);
    fx.engine.push(&[path.clone()], None).await;
    let pointer_path = fx.files().join("backup.tar.refile");
    fx.mock.set_corrupt_downloads(true);

    let report = fx.engine.pull(&[pointer_path.clone()], None).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, FailureKind::Integrity);
    assert!(!path.exists());
    assert!(pointer_path.exists());
    assert!(fx.engine.registry().contains(&pointer_path));
}

#[tokio::test]
async fn test_missing_remote_object_is_transport_failure() {
    let fx = fixture().await;
    let path = fx.files().join("clip.mov");
    write_file(&path, 512);
    let report = fx.engine.push(&[path.clone()], None).await;
    let pointer_path = report.files[0].pointer_path.clone();
    let url = url::Url::parse(read_json(&pointer_path)["url"].as_str().unwrap()).unwrap();
    assert!(fx.mock.remove(&url).await);

    let report = fx.engine.pull(&[pointer_path.clone()], None).await;
    assert_eq!(report.errors[0].kind, FailureKind::Transport);
    assert!(pointer_path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_system_paths_are_refused() {
    let fx = fixture().await;
    let report = fx.engine.push(&["/etc/hosts".into()], None).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].kind, FailureKind::Safety);
    assert!(fx.mock.is_empty().await);

    let report = fx.engine.pull(&["/etc/hosts.refile".into()], None).await;
    assert_eq!(report.errors[0].kind, FailureKind::Safety);
}

#[tokio::test]
async fn test_extra_excluded_paths_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let private = dir.path().join("private");
    let fx = fixture_with(|settings| settings.extra_excluded_paths = vec![private.clone()]).await;
    let path = private.join("taxes.pdf");
    let content = write_file(&path, 64);

    let report = fx.engine.push(&[path.clone()], None).await;
    assert_eq!(report.errors[0].kind, FailureKind::Safety);
    assert_eq!(std::fs::read(&path).unwrap(), content);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_directory_does_not_bypass_exclusions() {
    let dir = tempfile::tempdir().unwrap();
    let protected = dir.path().join("protected");
    let fx = fixture_with(|settings| settings.extra_excluded_paths = vec![protected.clone()]).await;
    let original = protected.join("taxes.pdf");
    let content = write_file(&original, 64);
    let innocent = dir.path().join("innocent");
    std::os::unix::fs::symlink(&protected, &innocent).unwrap();

    let report = fx.engine.push(&[innocent.join("taxes.pdf")], None).await;
    assert_eq!(report.pushed, 0);
    assert_eq!(report.errors[0].kind, FailureKind::Safety);
    assert_eq!(std::fs::read(&original).unwrap(), content);
    assert!(!protected.join("taxes.pdf.refile").exists());
    assert!(fx.mock.is_empty().await);

    let report = fx.engine.pull(&[innocent.join("taxes.pdf.refile")], None).await;
    assert_eq!(report.errors[0].kind, FailureKind::Safety);
}

#[tokio::test]
async fn test_failure_messages_include_the_cause() {
    let fx = fixture().await;
    fx.mock.set_reject_uploads(true);
    let path = fx.files().join("movie.mp4");
    write_file(&path, 64);

    let report = fx.engine.push(&[path], None).await;
    assert_eq!(report.errors[0].kind, FailureKind::Transport);
    assert_eq!(report.errors[0].message, "upload failed: backend error: mock rejected the upload");
}

#[tokio::test]
async fn test_pointer_files_are_not_pushed_again() {
    let fx = fixture().await;
    let path = fx.files().join("a.mkv");
    write_file(&path, 100);
    fx.engine.push(&[path], None).await;

    let report = fx.engine.push(&[fx.files().join("a.mkv.revid")], None).await;
    assert_eq!(report.errors[0].kind, FailureKind::Validation);
    assert_eq!(fx.mock.len().await, 1);
}

#[tokio::test]
async fn test_failures_do_not_stop_the_batch() {
    let fx = fixture().await;
    let missing = fx.files().join("missing.bin");
    let present = fx.files().join("present.bin");
    write_file(&present, 10);

    let report = fx.engine.push(&[missing.clone(), present], None).await;
    assert_eq!(report.pushed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].path.as_deref(), Some(missing.as_path()));
    assert_eq!(report.errors[0].kind, FailureKind::Io);
}

#[tokio::test]
async fn test_progress_events_in_order() {
    let fx = fixture().await;
    let path = fx.files().join("a.bin");
    write_file(&path, 10);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    fx.engine.push(&[path.clone()], Some(tx)).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let phase = |phase| Progress::Phase { path: path.clone(), phase };
    assert_eq!(
        events,
        [
            Progress::Started { total: 1 },
            phase(Phase::Hashing),
            phase(Phase::Uploading),
            phase(Phase::Verifying),
            phase(Phase::WritingPointer),
            Progress::Done { path: path.clone() },
            Progress::Finished,
        ]
    );
}

#[tokio::test]
async fn test_cancel_stops_remaining_files() {
    let fx = fixture().await;
    let paths: Vec<_> = (0..4).map(|i| fx.files().join(format!("{i}.bin"))).collect();
    for path in &paths {
        write_file(path, 1024);
    }
    assert!(!fx.engine.cancel());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = fx.engine.clone();
    let (report, ()) = tokio::join!(fx.engine.push(&paths, Some(tx)), async move {
        while let Some(event) = rx.recv().await {
            if matches!(event, Progress::Done { .. }) {
                engine.cancel();
                break;
            }
        }
    });
    assert!(report.pushed >= 1);
    assert!(report.cancelled >= 1);
    assert_eq!(report.pushed + report.cancelled, paths.len());
    for error in &report.errors {
        assert_eq!(error.kind, FailureKind::Cancelled);
        assert!(error.path.as_ref().unwrap().exists());
    }
}
