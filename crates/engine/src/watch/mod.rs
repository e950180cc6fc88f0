//! Unattended virtualization of watched folders.
//!
//! Each poll scans every enabled folder (not recursively), pushes the
//! ordinary files at or above the folder's threshold, and journals one
//! [`WatchEvent`] per file pushed or failed. The journal is capped; the
//! oldest events are dropped first.
//!
//! The threshold only selects candidates: once a file is handed to
//! [`Engine::push`](crate::Engine::push) its size is not checked again.

pub mod error;
mod models;

pub use self::models::{MIN_THRESHOLD_BYTES, WatchAction, WatchEvent, WatchFolder, folder_id};
use self::models::WatchState;
use crate::Engine;
use crate::watch::error::{ErrorKind, Result};
use exn::ResultExt;
use refile_config::JsonDocument;
use refile_pointer::normalize_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Shortest interval between polls.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Totals for one poll across all enabled folders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub folders: usize,
    pub pushed: usize,
    pub failed: usize,
}

/// The watched folders, their event journal, and the loop that polls them.
///
/// State is held copy-on-write: readers clone an `Arc`, writers (serialized
/// by an async mutex) persist the next state before swapping it in.
pub struct WatchLoop {
    engine: Arc<Engine>,
    document: JsonDocument<WatchState>,
    state: RwLock<Arc<WatchState>>,
    writer: Mutex<()>,
    polling: AtomicBool,
    events: broadcast::Sender<WatchEvent>,
    interval: Duration,
    event_cap: usize,
    default_threshold: u64,
}
impl WatchLoop {
    /// Load the watch state from the engine's data directory.
    pub async fn open(engine: Arc<Engine>) -> Result<Self> {
        let settings = engine.settings();
        let document = JsonDocument::<WatchState>::new(settings.watch_path());
        let state = document.load().await.or_raise(|| ErrorKind::Load)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            interval: Duration::from_secs(settings.watch.interval_secs).max(MIN_INTERVAL),
            event_cap: settings.watch.event_cap,
            default_threshold: settings.watch.default_threshold_bytes,
            document,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            polling: AtomicBool::new(false),
            events,
            engine,
        })
    }

    fn snapshot(&self) -> Arc<WatchState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn folders(&self) -> Vec<WatchFolder> {
        self.snapshot().folders.clone()
    }

    /// The journal, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<WatchEvent> {
        self.snapshot().events.iter().cloned().collect()
    }

    /// Live stream of events as polls produce them.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Folders
    // =========================================================================

    /// Watch `path`, or update the threshold of an already watched folder
    /// (re-enabling it). The threshold is floored at
    /// [`MIN_THRESHOLD_BYTES`]; `None` uses the configured default.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn add_folder(&self, path: impl AsRef<Path>, threshold: Option<u64>) -> Result<WatchFolder> {
        let path = normalize_path(path);
        let is_dir = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir());
        if !is_dir || self.engine.exclusions().is_protected(&path).await {
            exn::bail!(ErrorKind::InvalidFolder(path));
        }
        let threshold_bytes = threshold.unwrap_or(self.default_threshold).max(MIN_THRESHOLD_BYTES);
        let id = folder_id(&path);
        let folder = self
            .update(|state| {
                if let Some(existing) = state.folder_mut(&id) {
                    existing.threshold_bytes = threshold_bytes;
                    existing.enabled = true;
                    return existing.clone();
                }
                let folder = WatchFolder {
                    id: id.clone(),
                    path: path.clone(),
                    threshold_bytes,
                    enabled: true,
                    last_scan_at: None,
                };
                state.folders.push(folder.clone());
                folder
            })
            .await?;
        tracing::info!(id = %folder.id, threshold_bytes, "Watching folder");
        Ok(folder)
    }

    /// Stop watching a folder. Returns whether it was watched.
    pub async fn remove_folder(&self, id: &str) -> Result<bool> {
        if !self.snapshot().folders.iter().any(|f| f.id == id) {
            return Ok(false);
        }
        self.update(|state| {
            let before = state.folders.len();
            state.folders.retain(|f| f.id != id);
            state.folders.len() != before
        })
        .await
    }

    /// Pause or resume a folder. Returns whether the folder exists.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        if !self.snapshot().folders.iter().any(|f| f.id == id) {
            return Ok(false);
        }
        self.update(|state| match state.folder_mut(id) {
            Some(folder) => {
                folder.enabled = enabled;
                true
            },
            None => false,
        })
        .await
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Scan every enabled folder once and push what is over its threshold.
    ///
    /// Returns `None` without doing anything if another poll is already
    /// running.
    pub async fn poll_once(&self) -> Result<Option<PollSummary>> {
        if self.polling.swap(true, Ordering::AcqRel) {
            tracing::debug!("Poll already running, skipping");
            return Ok(None);
        }
        let _guard = PollGuard(&self.polling);
        self.poll().await.map(Some)
    }

    #[tracing::instrument(skip_all)]
    async fn poll(&self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        let mut events = Vec::new();
        let mut scanned = Vec::new();
        for folder in self.snapshot().folders.iter().filter(|f| f.enabled) {
            summary.folders += 1;
            let items = match self.engine.scan_folder(&folder.path).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(path = %folder.path.display(), error = %*e, "Could not scan watched folder");
                    continue;
                },
            };
            scanned.push(folder.id.clone());
            let sizes: HashMap<PathBuf, u64> = items
                .into_iter()
                .filter(|item| !item.is_directory && !item.is_virtualized && item.size >= folder.threshold_bytes)
                .map(|item| (item.path, item.size))
                .collect();
            if sizes.is_empty() {
                continue;
            }
            let mut candidates: Vec<PathBuf> = sizes.keys().cloned().collect();
            candidates.sort();
            tracing::debug!(path = %folder.path.display(), candidates = candidates.len(), "Pushing watched files");

            let report = self.engine.push(&candidates, None).await;
            let now = OffsetDateTime::now_utc();
            summary.pushed += report.pushed;
            summary.failed += report.failed;
            events.extend(report.files.into_iter().map(|file| WatchEvent {
                timestamp: now,
                file_path: file.path,
                size: file.size,
                action: WatchAction::Pushed,
                error: None,
            }));
            // A batch-level failure has no path: journal it against every
            // candidate.
            for error in report.errors {
                let paths = match &error.path {
                    Some(path) => vec![path.clone()],
                    None => candidates.clone(),
                };
                events.extend(paths.into_iter().map(|path| WatchEvent {
                    timestamp: now,
                    size: sizes.get(&path).copied().unwrap_or(0),
                    file_path: path,
                    action: WatchAction::Failed,
                    error: Some(error.message.clone()),
                }));
            }
        }

        let now = OffsetDateTime::now_utc();
        let cap = self.event_cap;
        let journaled = events.clone();
        self.update(move |state| {
            for id in &scanned {
                if let Some(folder) = state.folder_mut(id) {
                    folder.last_scan_at = Some(now);
                }
            }
            state.record(journaled, cap);
        })
        .await?;
        for event in events {
            // No subscribers is fine.
            _ = self.events.send(event);
        }
        tracing::info!(folders = summary.folders, pushed = summary.pushed, failed = summary.failed, "Watch poll finished");
        Ok(summary)
    }

    /// Poll on the configured interval until `shutdown` is cancelled. The
    /// first poll happens immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(error = %*e, "Watch poll failed");
                    }
                },
            }
        }
        tracing::info!("Watch loop stopped");
    }

    /// Apply `change` to a copy of the state, persist it, then swap it in.
    async fn update<R>(&self, change: impl FnOnce(&mut WatchState) -> R) -> Result<R> {
        let _guard = self.writer.lock().await;
        let mut next = WatchState::clone(&self.snapshot());
        let result = change(&mut next);
        self.document.save(&next).await.or_raise(|| ErrorKind::Persist)?;
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(result)
    }
}

/// Clears the polling flag when a poll finishes or its future is dropped.
struct PollGuard<'a>(&'a AtomicBool);
impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
