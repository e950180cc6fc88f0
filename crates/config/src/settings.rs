//! Process-level settings.
//!
//! Layered with `figment`, later sources overriding earlier ones:
//!
//! 1. built-in defaults,
//! 2. an optional settings file (TOML, YAML or JSON, picked by extension),
//! 3. `REFILE_`-prefixed environment variables, with `__` separating nested
//!    keys (`REFILE_WATCH__INTERVAL_SECS=60`).

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where every persisted document lives.
    pub data_dir: PathBuf,
    pub watch: WatchSettings,
    /// Paths never scanned, pushed or pulled, on top of the built-in system
    /// path denylist.
    pub extra_excluded_paths: Vec<PathBuf>,
}
impl Default for Settings {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("", "", "refile")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".refile"));
        Self {
            data_dir,
            watch: WatchSettings::default(),
            extra_excluded_paths: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Seconds between two polls of the watched folders.
    pub interval_secs: u64,
    /// Maximum number of events kept in the watch journal.
    pub event_cap: usize,
    /// Threshold used when a folder is added without one.
    pub default_threshold_bytes: u64,
}
impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            event_cap: 500,
            default_threshold_bytes: 100 * MIB,
        }
    }
}

impl Settings {
    /// Load settings from the defaults, an optional file, and the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::extract(Self::figment(file)?)
    }

    /// The layered sources without extracting them, so callers can merge in
    /// further providers.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
                Some("json") => figment.merge(Json::file_exact(file)),
                _ => exn::bail!(ErrorKind::Invalid(format!("unsupported settings file `{}`", file.display()))),
            };
        }
        Ok(figment.merge(Env::prefixed("REFILE_").split("__")))
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().map_err(|e| ErrorKind::Settings(e.to_string()))?;
        if settings.watch.interval_secs == 0 {
            exn::bail!(ErrorKind::Invalid("watch.interval_secs must be at least 1".to_string()));
        }
        if settings.watch.event_cap == 0 {
            exn::bail!(ErrorKind::Invalid("watch.event_cap must be at least 1".to_string()));
        }
        tracing::debug!(data_dir = %settings.data_dir.display(), "Settings loaded");
        Ok(settings)
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    #[must_use]
    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join("stats.json")
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry.json")
    }

    #[must_use]
    pub fn watch_path(&self) -> PathBuf {
        self.data_dir.join("watch.json")
    }
}
