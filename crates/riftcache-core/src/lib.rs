//! # riftcache-core
//!
//! Path and content-hash identity primitives shared by every other
//! `riftcache-*` crate. Nothing in here touches a filesystem or a
//! database; it is pure data and comparison logic.

mod error;
mod hash;
mod link;
mod path;

pub use error::CoreError;
pub use hash::HashInfo;
pub use link::{default_link_types, LinkKind};
pub use path::{PathRef, RelPath, Scheme};

/// Suffix appended to a directory's digest to distinguish it from a
/// file digest of the same bytes (see `HashInfo::is_dir`).
pub const DIR_SUFFIX: &str = ".dir";

/// Conventional marker-file name used by the sub-repository rule in
/// `riftcache-ignore` and referenced here so every crate agrees on it.
pub const REPO_MARKER_DIR: &str = ".riftcache";
