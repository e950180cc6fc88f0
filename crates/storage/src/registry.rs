use crate::BackendHandle;
use crate::backend::create_backend;
use crate::config::BackendConfig;
use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// The set of constructed backends, keyed by id, plus the default.
///
/// Pointers record the id of the backend their content went to; the default
/// is used for new pushes and for older pointers that predate the id.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    default: Option<String>,
    backends: BTreeMap<String, BackendHandle>,
}
impl BackendRegistry {
    /// Construct every configured backend.
    ///
    /// Fails as a whole if any single entry fails to construct.
    #[tracing::instrument(level = "debug", skip(backends), fields(count = backends.len()))]
    pub async fn from_config(default: Option<&str>, backends: &BTreeMap<String, BackendConfig>) -> Result<Self> {
        let mut registry = Self::default();
        for (id, config) in backends {
            registry.backends.insert(id.clone(), create_backend(id, config).await?);
        }
        registry.default = default.filter(|d| !d.is_empty()).map(str::to_string);
        Ok(registry)
    }

    /// Add (or replace) a constructed backend under its own name.
    pub fn with_backend(mut self, backend: BackendHandle) -> Self {
        self.backends.insert(backend.name().to_string(), backend);
        self
    }

    pub fn with_default(mut self, id: impl Into<String>) -> Self {
        self.default = Some(id.into());
        self
    }

    /// Find the backend for `id`, or the default when `id` is `None`.
    ///
    /// # Errors
    /// - [`NotConfigured`](ErrorKind::NotConfigured) if no backend exists at
    ///   all,
    /// - [`UnknownBackend`](ErrorKind::UnknownBackend) if the requested (or
    ///   default) id isn't configured.
    pub fn resolve(&self, id: Option<&str>) -> Result<BackendHandle> {
        if self.backends.is_empty() {
            exn::bail!(ErrorKind::NotConfigured);
        }
        let id = match id.or(self.default.as_deref()) {
            Some(id) => id,
            // A single backend is unambiguous even without a default.
            None => match self.backends.values().next() {
                Some(only) if self.backends.len() == 1 => return Ok(only.clone()),
                _ => exn::bail!(ErrorKind::NotConfigured),
            },
        };
        match self.backends.get(id) {
            Some(backend) => Ok(backend.clone()),
            None => exn::bail!(ErrorKind::UnknownBackend(id.to_string())),
        }
    }

    #[must_use]
    pub fn default_id(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
impl Debug for BackendRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BackendRegistry")
            .field("default", &self.default)
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
