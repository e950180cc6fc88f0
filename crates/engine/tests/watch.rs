mod common;

use common::{MIB, fixture, fixture_with, unconfigured, write_file};
use refile_engine::watch::{MIN_THRESHOLD_BYTES, WatchAction};
use refile_engine::{PollSummary, WatchLoop};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_poll_pushes_files_over_threshold() {
    let fx = fixture().await;
    let folder = fx.files();
    let big = folder.join("big.mkv");
    let small = folder.join("small.mkv");
    write_file(&big, 2 * MIB);
    write_file(&small, 100 * 1024);
    std::fs::create_dir(folder.join("nested")).unwrap();
    write_file(&folder.join("nested/deep.mkv"), 3 * MIB);

    let watch = WatchLoop::open(fx.engine.clone()).await.unwrap();
    let watched = watch.add_folder(&folder, Some(MIN_THRESHOLD_BYTES)).await.unwrap();
    let mut rx = watch.subscribe();

    let summary = watch.poll_once().await.unwrap().unwrap();
    assert_eq!(summary, PollSummary { folders: 1, pushed: 1, failed: 0 });
    assert!(!big.exists());
    assert!(folder.join("big.mkv.revid").exists());
    assert!(small.exists());
    assert!(folder.join("nested/deep.mkv").exists());

    let events = watch.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].file_path, big);
    assert_eq!(events[0].size, 2 * MIB);
    assert_eq!(events[0].action, WatchAction::Pushed);
    assert_eq!(rx.try_recv().unwrap(), events[0]);

    let folders = watch.folders();
    assert_eq!(folders[0].id, watched.id);
    assert!(folders[0].last_scan_at.is_some());

    // Pointers and small files are left alone on the next poll.
    let summary = watch.poll_once().await.unwrap().unwrap();
    assert_eq!(summary.pushed, 0);
    assert_eq!(watch.events().len(), 1);
}

#[tokio::test]
async fn test_disabled_folders_are_not_polled() {
    let fx = fixture().await;
    let folder = fx.files();
    let path = folder.join("big.iso");
    write_file(&path, 2 * MIB);

    let watch = WatchLoop::open(fx.engine.clone()).await.unwrap();
    let watched = watch.add_folder(&folder, Some(MIB)).await.unwrap();
    assert!(watch.set_enabled(&watched.id, false).await.unwrap());

    let summary = watch.poll_once().await.unwrap().unwrap();
    assert_eq!(summary, PollSummary::default());
    assert!(path.exists());
    assert!(fx.mock.is_empty().await);
}

#[tokio::test]
async fn test_journal_keeps_newest_events() {
    let fx = fixture_with(|settings| settings.watch.event_cap = 2).await;
    let folder = fx.files();
    for name in ["a.bin", "b.bin", "c.bin"] {
        write_file(&folder.join(name), MIB);
    }

    let watch = WatchLoop::open(fx.engine.clone()).await.unwrap();
    watch.add_folder(&folder, Some(MIB)).await.unwrap();
    let summary = watch.poll_once().await.unwrap().unwrap();
    assert_eq!(summary.pushed, 3);

    let names: Vec<_> = watch
        .events()
        .iter()
        .map(|e| e.file_path.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["b.bin", "c.bin"]);
}

#[tokio::test]
async fn test_failures_are_journaled() {
    let (dir, engine) = unconfigured().await;
    let folder = dir.path().join("downloads");
    let path = folder.join("setup.exe");
    let content = write_file(&path, 2 * MIB);

    let watch = WatchLoop::open(engine).await.unwrap();
    watch.add_folder(&folder, Some(MIB)).await.unwrap();
    let summary = watch.poll_once().await.unwrap().unwrap();
    assert_eq!(summary, PollSummary { folders: 1, pushed: 0, failed: 1 });

    let events = watch.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, WatchAction::Failed);
    assert_eq!(events[0].file_path, path);
    assert_eq!(events[0].size, 2 * MIB);
    assert_eq!(events[0].error.as_deref(), Some("No backend configured"));
    assert_eq!(std::fs::read(&path).unwrap(), content);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let fx = fixture().await;
    let folder = fx.files();
    write_file(&folder.join("big.bin"), 2 * MIB);

    let watch = WatchLoop::open(fx.engine.clone()).await.unwrap();
    let watched = watch.add_folder(&folder, Some(MIB)).await.unwrap();
    watch.poll_once().await.unwrap();
    drop(watch);

    let reopened = WatchLoop::open(fx.engine.clone()).await.unwrap();
    let folders = reopened.folders();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].id, watched.id);
    assert_eq!(folders[0].threshold_bytes, MIB);
    assert!(folders[0].last_scan_at.is_some());
    let events = reopened.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, WatchAction::Pushed);

    assert!(reopened.remove_folder(&watched.id).await.unwrap());
    assert!(reopened.folders().is_empty());
}

#[tokio::test]
async fn test_run_polls_until_shutdown() {
    let fx = fixture().await;
    let folder = fx.files();
    write_file(&folder.join("big.bin"), 2 * MIB);
    let watch = WatchLoop::open(fx.engine.clone()).await.unwrap();
    watch.add_folder(&folder, Some(MIB)).await.unwrap();
    let mut rx = watch.subscribe();
    let shutdown = CancellationToken::new();

    let stopped = tokio::time::timeout(Duration::from_secs(30), async {
        tokio::join!(watch.run(shutdown.clone()), async {
            let event = rx.recv().await.unwrap();
            shutdown.cancel();
            event
        })
    })
    .await;
    let ((), event) = stopped.unwrap();
    assert_eq!(event.action, WatchAction::Pushed);
    assert!(folder.join("big.bin.refile").exists());
}
