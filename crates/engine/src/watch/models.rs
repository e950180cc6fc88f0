use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Smallest threshold a folder can be watched with.
pub const MIN_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Length of a folder id, in hex characters.
const FOLDER_ID_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFolder {
    /// Derived from the normalized path: re-adding a folder finds the same
    /// entry.
    pub id: String,
    pub path: PathBuf,
    /// Files at least this large are pushed.
    pub threshold_bytes: u64,
    pub enabled: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_scan_at: Option<OffsetDateTime>,
}

/// Deterministic id for a (normalized) folder path.
#[must_use]
pub fn folder_id(path: &Path) -> String {
    let digest = blake3::hash(path.as_os_str().as_encoded_bytes());
    digest.to_hex()[..FOLDER_ID_LEN].to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchAction {
    Pushed,
    Failed,
}

/// One journal entry: a file the watch loop pushed, or tried to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub file_path: PathBuf,
    pub size: u64,
    pub action: WatchAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// On-disk shape of `watch.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct WatchState {
    #[serde(default)]
    pub folders: Vec<WatchFolder>,
    /// Oldest first.
    #[serde(default)]
    pub events: VecDeque<WatchEvent>,
}
impl WatchState {
    /// Append events, dropping the oldest beyond `cap`.
    pub fn record(&mut self, events: impl IntoIterator<Item = WatchEvent>, cap: usize) {
        self.events.extend(events);
        let excess = self.events.len().saturating_sub(cap);
        self.events.drain(..excess);
    }

    pub fn folder_mut(&mut self, id: &str) -> Option<&mut WatchFolder> {
        self.folders.iter_mut().find(|f| f.id == id)
    }
}
