//! # riftcache
//!
//! A content-addressed data versioning engine: records immutable
//! snapshots of files and directories under content hashes, stores
//! their bytes once, and materializes them back into a working tree
//! on demand. This crate is the facade over the component crates that
//! do the actual work — `riftcache-core` through `riftcache-checkout`
//! — plus the process lock and garbage collector that only make sense
//! at the whole-repository level.
//!
//! Out of scope here: the pipeline/stage DAG, remote transports, and
//! serialization of pipeline manifests and lock files — those are the
//! external caller's concern. This crate owns exactly the core: path
//! identity, the filesystem adapter, the state cache, the object
//! store, the link policy, the ignore filter, hashing, checkout and
//! change detection, plus the concurrency and GC machinery that core
//! needs.

mod error;
mod gc;
mod lock;
mod repo;

pub use error::{Result, RiftCacheError};
pub use gc::GcReport;
pub use lock::RepoLock;
pub use repo::Repository;

// Re-export the component crates' public surfaces so a caller of
// `riftcache` doesn't need to separately depend on each of them to
// name their types (`Output`, `HashInfo`, `LinkKind`, ...).
pub use riftcache_checkout::{CheckoutReport, Output, Status as CheckoutStatus};
pub use riftcache_config::Config;
pub use riftcache_core::{HashInfo, LinkKind, PathRef, RelPath};
