use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::progress::{Progress, ProgressSender, Reporter};
use crate::pull::pull_all;
use crate::push::push_all;
use crate::report::{BatchReport, FailureKind, NO_BACKEND_CONFIGURED, PullReport, PushReport};
use crate::safety::Exclusions;
use crate::scan::{ScanItem, scan_folder, scan_volumes};
use exn::ResultExt;
use refile_config::{ConfigStore, RefileConfig, Settings, StatsStore, VirtStats};
use refile_registry::Registry;
use refile_storage::BackendRegistry;
use refile_storage::error::ErrorKind as StorageErrorKind;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// What the engine is currently busy with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Scan,
    Push,
    Pull,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub session: Option<SessionKind>,
    pub stats: VirtStats,
    pub default_backend: Option<String>,
}

#[derive(Debug)]
struct Session {
    id: u64,
    kind: SessionKind,
    token: CancellationToken,
}

/// Clears the active session when the operation that started it finishes.
struct SessionGuard<'a> {
    slot: &'a Mutex<Option<Session>>,
    id: u64,
    token: CancellationToken,
}
impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|s| s.id == self.id) {
            *slot = None;
        }
    }
}

/// The file virtualization engine.
///
/// Owns no on-disk state of its own: the configuration, stats and registry
/// stores it holds are each the sole writer of their document. Every scan,
/// push or pull runs as a session with its own cancellation token; starting
/// a session while another is active makes the new one the target of
/// [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct Engine {
    settings: Settings,
    config: ConfigStore,
    stats: StatsStore,
    registry: Arc<Registry>,
    exclusions: Exclusions,
    /// Set in place of the configured backends.
    backends: Option<BackendRegistry>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
}
impl Engine {
    /// Open every store under `settings.data_dir`.
    #[tracing::instrument(skip_all, fields(data_dir = %settings.data_dir.display()))]
    pub async fn open(settings: Settings) -> Result<Self> {
        let config = ConfigStore::new(settings.config_path());
        let stats = StatsStore::open(settings.stats_path()).await.or_raise(|| ErrorKind::Stats)?;
        let registry = Registry::open(settings.registry_path()).await.or_raise(|| ErrorKind::Registry)?;
        let exclusions = Exclusions::new(settings.extra_excluded_paths.iter().cloned());
        Ok(Self {
            settings,
            config,
            stats,
            registry: Arc::new(registry),
            exclusions,
            backends: None,
            session: Mutex::new(None),
            next_session: AtomicU64::new(0),
        })
    }

    /// Use an already constructed set of backends instead of building one
    /// from the configuration document for every batch.
    #[must_use]
    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = Some(backends);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    pub async fn config(&self) -> Result<RefileConfig> {
        self.config.load().await.or_raise(|| ErrorKind::Config)
    }

    /// Validate and store a new backend configuration. Nothing is written if
    /// any part of it is invalid.
    pub async fn save_config(&self, config: &RefileConfig) -> Result<()> {
        self.config.save(config).await.or_raise(|| ErrorKind::Config)
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let default_backend = match &self.backends {
            Some(backends) => backends.default_id().map(str::to_string),
            None => self.config().await?.default_backend().map(str::to_string),
        };
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|s| s.kind);
        Ok(EngineStatus {
            session,
            stats: self.stats.get().await,
            default_backend,
        })
    }

    /// Cancel the active session, if any. The file being worked on is
    /// finished; the rest are reported as cancelled.
    pub fn cancel(&self) -> bool {
        match self.session.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(session) => {
                tracing::info!(kind = ?session.kind, "Cancelling session");
                session.token.cancel();
                true
            },
            None => false,
        }
    }

    // =========================================================================
    // Scan
    // =========================================================================

    /// List one folder (not recursively). Pointer files found are indexed.
    #[tracing::instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub async fn scan_folder(&self, root: impl AsRef<Path>) -> Result<Vec<ScanItem>> {
        let session = self.begin(SessionKind::Scan);
        let listing = scan_folder(root.as_ref(), &self.exclusions, &session.token)
            .await
            .or_raise(|| ErrorKind::Scan)?;
        self.index(listing.pointers).await;
        if listing.cancelled {
            tracing::info!(found = listing.items.len(), "Scan cancelled");
        }
        Ok(listing.items)
    }

    /// List every file on the given volumes, largest first. Pointer files
    /// found are indexed.
    #[tracing::instrument(skip_all, fields(roots = roots.len()))]
    pub async fn scan_volumes(&self, roots: &[PathBuf]) -> Vec<ScanItem> {
        let session = self.begin(SessionKind::Scan);
        let listing = scan_volumes(roots, &self.exclusions, &session.token).await;
        self.index(listing.pointers).await;
        tracing::info!(found = listing.items.len(), cancelled = listing.cancelled, "Volume scan finished");
        listing.items
    }

    /// Mounted volume roots worth scanning: drive letters on Windows, `/`
    /// elsewhere.
    #[must_use]
    pub fn default_volumes() -> Vec<PathBuf> {
        if cfg!(windows) {
            (b'A'..=b'Z')
                .map(|letter| PathBuf::from(format!("{}:\\", char::from(letter))))
                .filter(|root| root.exists())
                .collect()
        } else {
            vec![PathBuf::from("/")]
        }
    }

    async fn index(&self, pointers: Vec<refile_registry::RegistryEntry>) {
        if pointers.is_empty() {
            return;
        }
        if let Err(e) = self.registry.add_entries(pointers).await {
            tracing::warn!(error = %*e, "Could not index pointers found by scan");
        }
    }

    // =========================================================================
    // Push/Pull
    // =========================================================================

    /// Virtualize `paths` one after the other using the default backend.
    ///
    /// Never fails as a whole: per-file failures are in the report. Without
    /// any usable backend nothing is attempted, and the report counts every
    /// file as failed.
    #[tracing::instrument(skip_all, fields(files = paths.len()))]
    pub async fn push(&self, paths: &[PathBuf], progress: Option<ProgressSender>) -> PushReport {
        let progress = Reporter::new(progress);
        progress.emit(Progress::Started { total: paths.len() });
        let backend = match self.resolve_backends().await {
            Ok(backends) => backends.resolve(None).map_err(|e| abort_reason(&e)),
            Err(reason) => Err(reason),
        };
        let report = match backend {
            Ok(backend) => {
                let session = self.begin(SessionKind::Push);
                push_all(paths, &backend, &self.context(), &session.token, &progress).await
            },
            Err((kind, message)) => {
                tracing::warn!(%message, "Push aborted");
                PushReport::aborted(paths.len(), kind, message)
            },
        };
        progress.emit(Progress::Finished);
        tracing::info!(pushed = report.pushed, failed = report.failed, cancelled = report.cancelled, "Push finished");
        report
    }

    /// Restore the files behind `pointer_paths` one after the other.
    ///
    /// Each pointer is pulled from the backend it names, or the default
    /// backend for pointers that don't name one.
    #[tracing::instrument(skip_all, fields(files = pointer_paths.len()))]
    pub async fn pull(&self, pointer_paths: &[PathBuf], progress: Option<ProgressSender>) -> PullReport {
        let progress = Reporter::new(progress);
        progress.emit(Progress::Started { total: pointer_paths.len() });
        let report = match self.resolve_backends().await {
            Ok(backends) => {
                let session = self.begin(SessionKind::Pull);
                pull_all(pointer_paths, &backends, &self.context(), &session.token, &progress).await
            },
            Err((kind, message)) => {
                tracing::warn!(%message, "Pull aborted");
                PullReport::aborted(pointer_paths.len(), kind, message)
            },
        };
        progress.emit(Progress::Finished);
        tracing::info!(pulled = report.pulled, failed = report.failed, cancelled = report.cancelled, "Pull finished");
        report
    }

    /// The backends for one batch, or why the batch can't run at all.
    async fn resolve_backends(&self) -> std::result::Result<BackendRegistry, (FailureKind, String)> {
        let backends = match &self.backends {
            Some(backends) => backends.clone(),
            None => {
                let config = self
                    .config()
                    .await
                    .map_err(|e| (FailureKind::Configuration, (*e).to_string()))?;
                BackendRegistry::from_config(config.default_backend(), &config.backends)
                    .await
                    .map_err(|e| abort_reason(&e))?
            },
        };
        if backends.is_empty() {
            return Err((FailureKind::Configuration, NO_BACKEND_CONFIGURED.to_string()));
        }
        Ok(backends)
    }

    fn context(&self) -> Context<'_> {
        Context {
            registry: &self.registry,
            stats: &self.stats,
            exclusions: &self.exclusions,
        }
    }

    fn begin(&self, kind: SessionKind) -> SessionGuard<'_> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.session.lock().unwrap_or_else(PoisonError::into_inner).replace(Session {
            id,
            kind,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(previous = ?previous.kind, current = ?kind, "Session started while another was active");
        }
        SessionGuard { slot: &self.session, id, token }
    }
}

fn abort_reason(e: &refile_storage::error::Error) -> (FailureKind, String) {
    match &**e {
        StorageErrorKind::NotConfigured => (FailureKind::Configuration, NO_BACKEND_CONFIGURED.to_string()),
        kind if kind.is_configuration() => (FailureKind::Configuration, kind.to_string()),
        kind => (FailureKind::Transport, kind.to_string()),
    }
}
