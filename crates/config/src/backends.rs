use crate::document::JsonDocument;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use refile_storage::BackendConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// The backend configuration document (`config.json`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefileConfig {
    /// Id of the backend new pushes go to. May be empty when at most one
    /// backend is configured.
    #[serde(default)]
    pub default_backend: String,
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}
impl RefileConfig {
    /// Check the document as a whole: every backend entry, and the default
    /// referring to one of them.
    pub fn validate(&self) -> Result<()> {
        for (id, backend) in &self.backends {
            if id.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid("backend ids must not be empty".to_string()));
            }
            backend.validate().or_raise(|| ErrorKind::Invalid(format!("backend `{id}`")))?;
        }
        if !self.default_backend.is_empty() && !self.backends.contains_key(&self.default_backend) {
            exn::bail!(ErrorKind::Invalid(format!("default backend `{}` is not configured", self.default_backend)));
        }
        Ok(())
    }

    /// The default backend id, if one is set.
    #[must_use]
    pub fn default_backend(&self) -> Option<&str> {
        Some(self.default_backend.as_str()).filter(|d| !d.is_empty())
    }
}

/// Sole reader and writer of the backend configuration document.
///
/// Saving is all-or-nothing: a configuration that fails validation is
/// rejected before anything touches the disk.
#[derive(Debug)]
pub struct ConfigStore {
    document: JsonDocument<RefileConfig>,
    // Serializes saves so two writers can't interleave.
    lock: Mutex<()>,
}
impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path),
            lock: Mutex::new(()),
        }
    }

    /// Load and validate the stored configuration. A missing document is an
    /// empty configuration.
    pub async fn load(&self) -> Result<RefileConfig> {
        let config = self.document.load().await?;
        config.validate()?;
        Ok(config)
    }

    #[tracing::instrument(skip_all, fields(backends = config.backends.len()))]
    pub async fn save(&self, config: &RefileConfig) -> Result<()> {
        config.validate()?;
        let _guard = self.lock.lock().await;
        self.document.save(config).await?;
        tracing::info!(path = %self.document.path().display(), "Backend configuration saved");
        Ok(())
    }
}
