//! Local index of virtualized files.
//!
//! The registry is not the source of truth: the pointer files are. It exists
//! so that "what have I virtualized, and how much space did it save?" can be
//! answered without walking the disk. If `registry.json` is deleted or goes
//! stale it can be rebuilt by scanning folders for pointer files
//! ([`Registry::rebuild`]).

pub mod error;
mod models;
mod registry;

pub use crate::models::{CategoryStats, RegistryEntry, RegistryStats, ScanOutcome};
pub use crate::registry::Registry;
