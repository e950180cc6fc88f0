//! Pointer files: the small JSON documents left behind when a file is
//! virtualized.
//!
//! This crate owns everything about a pointer that doesn't need a network or a
//! storage backend:
//!
//! - **Format**: the two co-existing pointer versions ([`PointerVersion`]),
//!   their JSON encoding, and the fail-closed parse step ([`codec`]).
//! - **Migration**: legacy v1 image pointers stored as `.repic` are lazily
//!   rewritten as v2 the first time they are read ([`codec::load`]).
//! - **Hashing**: SHA-256 content hashes in the `sha256:<hex>` form
//!   ([`hash`]).
//! - **Paths**: the closed set of pointer extensions ([`PointerKind`]) and
//!   the mapping between original and pointer paths.
//! - **Mime**: extension-based mime detection and coarse categories
//!   ([`mime`]).

mod atomic;
pub mod codec;
pub mod error;
pub mod hash;
mod kind;
pub mod mime;
mod models;
mod path;

pub use crate::atomic::write_atomic;
pub use crate::codec::{Loaded, load, read, write};
pub use crate::hash::ContentHash;
pub use crate::kind::{PointerKind, extension_for_mime, is_pointer_path, original_path_for, pointer_path_for};
pub use crate::models::{FileMeta, NewPointer, Pointer, PointerVersion};
pub use crate::path::normalize as normalize_path;
