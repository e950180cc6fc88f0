use crate::document::JsonDocument;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Running totals of what has been virtualized (`stats.json`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtStats {
    pub virtualized_files: u64,
    pub saved_bytes: u64,
}
impl VirtStats {
    #[must_use]
    pub fn added(self, files: u64, bytes: u64) -> Self {
        Self {
            virtualized_files: self.virtualized_files.saturating_add(files),
            saved_bytes: self.saved_bytes.saturating_add(bytes),
        }
    }

    /// Subtract, floored at zero: the stats document may have been reset or
    /// edited since the files were pushed.
    #[must_use]
    pub fn removed(self, files: u64, bytes: u64) -> Self {
        Self {
            virtualized_files: self.virtualized_files.saturating_sub(files),
            saved_bytes: self.saved_bytes.saturating_sub(bytes),
        }
    }
}

/// Sole reader and writer of the stats document. Every change is persisted
/// immediately.
#[derive(Debug)]
pub struct StatsStore {
    document: JsonDocument<VirtStats>,
    current: Mutex<VirtStats>,
}
impl StatsStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let document = JsonDocument::new(path);
        let current = Mutex::new(document.load().await?);
        Ok(Self { document, current })
    }

    pub async fn get(&self) -> VirtStats {
        *self.current.lock().await
    }

    pub async fn add(&self, files: u64, bytes: u64) -> Result<VirtStats> {
        self.update(|stats| stats.added(files, bytes)).await
    }

    pub async fn subtract(&self, files: u64, bytes: u64) -> Result<VirtStats> {
        self.update(|stats| stats.removed(files, bytes)).await
    }

    async fn update(&self, change: impl FnOnce(VirtStats) -> VirtStats) -> Result<VirtStats> {
        let mut current = self.current.lock().await;
        let next = change(*current);
        self.document.save(&next).await?;
        *current = next;
        Ok(next)
    }
}
