use refile_pointer::mime::MimeCategory;
use refile_pointer::{ContentHash, Pointer, normalize_path, original_path_for};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One virtualized file, keyed by its (normalized) pointer path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub pointer_path: PathBuf,
    /// Where the file is restored to: the pointer path minus its extension.
    pub original_path: PathBuf,
    pub name: String,
    pub hash: ContentHash,
    pub size: u64,
    pub mime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
impl RegistryEntry {
    #[must_use]
    pub fn from_pointer(pointer_path: impl AsRef<Path>, pointer: &Pointer) -> Self {
        let pointer_path = normalize_path(pointer_path);
        Self {
            original_path: original_path_for(&pointer_path),
            pointer_path,
            name: pointer.name.clone(),
            hash: pointer.hash.clone(),
            size: pointer.size,
            mime: pointer.mime.clone(),
            backend: pointer.backend.clone(),
            created_at: pointer.created_at,
        }
    }

    #[must_use]
    pub fn category(&self) -> MimeCategory {
        MimeCategory::from_mime(&self.mime)
    }
}

/// On-disk shape of `registry.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct RegistryDocument {
    #[serde(default)]
    pub entries: Vec<RegistryEntry>,
}

/// What a folder scan found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Pointer files newly indexed.
    pub added: usize,
    /// Of those, legacy pointers upgraded on disk while being read.
    pub migrated: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub files: u64,
    pub bytes: u64,
}

/// Aggregate view of the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_files: u64,
    pub total_bytes: u64,
    /// Every category is present, including empty ones.
    pub by_category: BTreeMap<MimeCategory, CategoryStats>,
}
impl Default for RegistryStats {
    fn default() -> Self {
        Self {
            total_files: 0,
            total_bytes: 0,
            by_category: MimeCategory::ALL.into_iter().map(|c| (c, CategoryStats::default())).collect(),
        }
    }
}
impl<'a> FromIterator<&'a RegistryEntry> for RegistryStats {
    fn from_iter<I: IntoIterator<Item = &'a RegistryEntry>>(entries: I) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total_files += 1;
            stats.total_bytes = stats.total_bytes.saturating_add(entry.size);
            let category = stats.by_category.entry(entry.category()).or_default();
            category.files += 1;
            category.bytes = category.bytes.saturating_add(entry.size);
        }
        stats
    }
}
