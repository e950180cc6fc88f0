use crate::error::{ErrorKind, Result};
use crate::models::{RegistryDocument, RegistryEntry, RegistryStats, ScanOutcome};
use exn::ResultExt;
use refile_config::JsonDocument;
use refile_pointer::{is_pointer_path, normalize_path};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::instrument;

type Entries = BTreeMap<PathBuf, RegistryEntry>;

/// Index of every virtualized file, keyed by normalized pointer path.
///
/// Readers take a cheap snapshot of the current map. Writers are serialized,
/// build the next map off to the side, flush it to disk, and only then swap
/// it in: a failed flush leaves both the document and the in-memory index as
/// they were.
#[derive(Debug)]
pub struct Registry {
    document: JsonDocument<RegistryDocument>,
    entries: RwLock<Arc<Entries>>,
    writer: Mutex<()>,
}
impl Registry {
    /// Open the registry document at `path`. A missing document is an empty
    /// registry; so is an unreadable one, since the index can always be
    /// rebuilt from the pointer files themselves.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let document = JsonDocument::<RegistryDocument>::new(path);
        let loaded = match document.load().await {
            Ok(loaded) => loaded,
            Err(e) if matches!(&*e, refile_config::error::ErrorKind::Malformed(_)) => {
                tracing::warn!(path = %document.path().display(), error = %*e, "Registry document is corrupt, starting empty");
                RegistryDocument::default()
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Load),
        };
        let entries: Entries = loaded
            .entries
            .into_iter()
            .map(|entry| (normalize_path(&entry.pointer_path), entry))
            .collect();
        tracing::debug!(entries = entries.len(), "Registry opened");
        Ok(Self {
            document,
            entries: RwLock::new(Arc::new(entries)),
            writer: Mutex::new(()),
        })
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// A consistent snapshot of the whole index.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BTreeMap<PathBuf, RegistryEntry>> {
        Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Every entry, ordered by pointer path.
    #[must_use]
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.snapshot().values().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, pointer_path: impl AsRef<Path>) -> Option<RegistryEntry> {
        self.snapshot().get(&normalize_path(pointer_path)).cloned()
    }

    #[must_use]
    pub fn contains(&self, pointer_path: impl AsRef<Path>) -> bool {
        self.snapshot().contains_key(&normalize_path(pointer_path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Totals across the index, broken down by mime category.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.snapshot().values().collect()
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Insert or replace entries, keyed by their pointer path.
    #[instrument(skip_all)]
    pub async fn add_entries(&self, entries: impl IntoIterator<Item = RegistryEntry>) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut next = Entries::clone(&self.snapshot());
        let mut changed = 0usize;
        for entry in entries {
            next.insert(normalize_path(&entry.pointer_path), entry);
            changed += 1;
        }
        if changed == 0 {
            return Ok(());
        }
        self.commit(next).await?;
        tracing::debug!(added = changed, "Registry entries added");
        Ok(())
    }

    /// Remove the entries for the given pointer paths. Returns how many were
    /// actually present.
    #[instrument(skip_all)]
    pub async fn remove_entries<P: AsRef<Path>>(&self, pointer_paths: impl IntoIterator<Item = P>) -> Result<usize> {
        let _guard = self.writer.lock().await;
        let mut next = Entries::clone(&self.snapshot());
        let removed = pointer_paths
            .into_iter()
            .filter(|path| next.remove(&normalize_path(path)).is_some())
            .count();
        if removed == 0 {
            return Ok(0);
        }
        self.commit(next).await?;
        tracing::debug!(removed, "Registry entries removed");
        Ok(removed)
    }

    /// Index pointer files found directly inside `folders` (not recursively)
    /// that aren't indexed yet. Legacy pointers are migrated as they're read;
    /// files that don't parse as pointers are skipped.
    #[instrument(skip_all, fields(folders = folders.len()))]
    pub async fn scan_folders(&self, folders: &[PathBuf]) -> Result<ScanOutcome> {
        let known = self.snapshot();
        let found = discover(folders, |path| known.contains_key(path)).await;
        drop(known);

        let _guard = self.writer.lock().await;
        let mut next = Entries::clone(&self.snapshot());
        let mut outcome = ScanOutcome::default();
        for (entry, migrated) in found {
            // Another writer may have indexed it while the scan was running.
            if next.contains_key(&entry.pointer_path) {
                continue;
            }
            outcome.added += 1;
            outcome.migrated += usize::from(migrated);
            next.insert(entry.pointer_path.clone(), entry);
        }
        if outcome.added > 0 {
            self.commit(next).await?;
        }
        tracing::info!(added = outcome.added, migrated = outcome.migrated, "Registry scan complete");
        Ok(outcome)
    }

    /// Replace the whole index with what a scan of `folders` finds.
    #[instrument(skip_all, fields(folders = folders.len()))]
    pub async fn rebuild(&self, folders: &[PathBuf]) -> Result<ScanOutcome> {
        let _guard = self.writer.lock().await;
        let found = discover(folders, |_| false).await;
        let mut outcome = ScanOutcome::default();
        let mut next = Entries::new();
        for (entry, migrated) in found {
            outcome.migrated += usize::from(migrated);
            next.insert(entry.pointer_path.clone(), entry);
        }
        outcome.added = next.len();
        self.commit(next).await?;
        tracing::info!(entries = outcome.added, migrated = outcome.migrated, "Registry rebuilt");
        Ok(outcome)
    }

    /// Flush `next` to disk, then make it the live index. Callers must hold
    /// the writer lock.
    async fn commit(&self, next: Entries) -> Result<()> {
        let document = RegistryDocument { entries: next.values().cloned().collect() };
        self.document.save(&document).await.or_raise(|| ErrorKind::Persist)?;
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(())
    }
}

/// Load every pointer file directly inside `folders` that `skip` doesn't
/// exclude. Returns each entry with whether its pointer was migrated.
async fn discover(folders: &[PathBuf], skip: impl Fn(&Path) -> bool) -> Vec<(RegistryEntry, bool)> {
    let mut found = Vec::new();
    for folder in folders {
        let mut dir = match fs::read_dir(folder).await {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(path = %folder.display(), error = %e, "Could not read folder");
                continue;
            },
        };
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(path = %folder.display(), error = %e, "Could not list folder");
                    break;
                },
            };
            let path = normalize_path(entry.path());
            if !is_pointer_path(&path) || skip(&path) {
                continue;
            }
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            match refile_pointer::load(&path).await {
                Ok(loaded) => found.push((RegistryEntry::from_pointer(&path, &loaded.pointer), loaded.migrated)),
                Err(e) => tracing::debug!(path = %path.display(), error = %*e, "Skipping unreadable pointer"),
            }
        }
    }
    found
}
