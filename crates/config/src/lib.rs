//! Configuration and small persisted documents.
//!
//! - [`Settings`]: process-level settings layered from defaults, a file and
//!   the environment.
//! - [`ConfigStore`]: the backend configuration document, validated as a
//!   whole before every save.
//! - [`StatsStore`]: running totals of virtualized files and saved bytes.
//! - [`JsonDocument`]: the load/atomic-save primitive every persisted
//!   document is built on.

mod backends;
mod document;
pub mod error;
mod settings;
mod stats;

pub use crate::backends::{ConfigStore, RefileConfig};
pub use crate::document::JsonDocument;
pub use crate::settings::{Settings, WatchSettings};
pub use crate::stats::{StatsStore, VirtStats};
