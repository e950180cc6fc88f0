#![allow(dead_code)]

use refile_config::Settings;
use refile_engine::Engine;
use refile_storage::BackendRegistry;
use refile_storage::backend::MockBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const MIB: u64 = 1024 * 1024;

pub struct Fixture {
    pub dir: TempDir,
    pub engine: Arc<Engine>,
    pub mock: Arc<MockBackend>,
}
impl Fixture {
    /// Where test files go (created on demand).
    pub fn files(&self) -> PathBuf {
        let files = self.dir.path().join("files");
        std::fs::create_dir_all(&files).unwrap();
        files
    }

    pub fn settings(&self) -> &Settings {
        self.engine.settings()
    }
}

pub fn settings(dir: &Path) -> Settings {
    Settings {
        data_dir: dir.join("state"),
        ..Settings::default()
    }
}

/// An engine backed by a single in-memory backend named `mock`.
pub async fn fixture() -> Fixture {
    fixture_with(|_| {}).await
}

pub async fn fixture_with(configure: impl FnOnce(&mut Settings)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    configure(&mut settings);
    let mock = Arc::new(MockBackend::default());
    let backends = BackendRegistry::default().with_backend(mock.clone()).with_default("mock");
    let engine = Engine::open(settings).await.unwrap().with_backends(backends);
    Fixture {
        dir,
        engine: Arc::new(engine),
        mock,
    }
}

/// An engine with nothing configured.
pub async fn unconfigured() -> (TempDir, Arc<Engine>) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(settings(dir.path())).await.unwrap();
    (dir, Arc::new(engine))
}

/// Write `size` bytes of non-repeating-ish content and return it.
pub fn write_file(path: &Path, size: u64) -> Vec<u8> {
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, &content).unwrap();
    content
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}
