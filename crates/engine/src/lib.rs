//! The file virtualization engine.
//!
//! Replaces large local files by small pointer files once their content is
//! safely stored on a remote backend ([`Engine::push`]), and brings them back
//! on demand ([`Engine::pull`]). The one rule every step follows: a file is
//! never deleted until whatever replaces it (a verified upload plus a pointer
//! that reads back intact, or a restored file whose content matches its
//! hash) is in place.
//!
//! - [`scan`]: listing folders and volumes, indexing the pointers found.
//! - [`push`] / [`pull`]: the per-file protocols, run strictly one file at a
//!   time.
//! - [`watch`]: polling watched folders and pushing what crosses their
//!   threshold.
//!
//! Batches report per-file outcomes ([`PushReport`], [`PullReport`]) rather
//! than failing as a whole, and can stream [`Progress`] over a channel.

mod engine;
pub mod error;
pub mod metadata;
pub mod progress;
pub mod pull;
pub mod push;
mod report;
pub mod safety;
pub mod scan;
pub mod watch;

pub use crate::engine::{Engine, EngineStatus, SessionKind};
pub use crate::progress::{Phase, Progress, ProgressSender};
pub use crate::report::{
    FailureKind, FileError, NO_BACKEND_CONFIGURED, PullReport, PulledFile, PushReport, PushedFile,
};
pub use crate::safety::Exclusions;
pub use crate::scan::ScanItem;
pub use crate::watch::{PollSummary, WatchLoop};
use refile_config::StatsStore;
use refile_registry::Registry;

/// What a push or pull updates besides the files themselves.
pub(crate) struct Context<'a> {
    pub registry: &'a Registry,
    pub stats: &'a StatsStore,
    pub exclusions: &'a Exclusions,
}
