//! Remote storage for virtualized file content.
//!
//! A [`StorageBackend`] stores opaque blobs and hands back a URL for each;
//! [`BackendConfig`] is the closed, tagged configuration schema and
//! [`BackendRegistry`] the set of backends constructed from it.

pub mod backend;
pub mod config;
pub mod error;
mod models;
mod path;
mod registry;

pub use crate::backend::{StorageBackend, create_backend};
pub use crate::config::BackendConfig;
pub use crate::models::{Upload, Verification};
pub use crate::path::validate as validate_path;
pub use crate::registry::BackendRegistry;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
