use std::path::PathBuf;

use thiserror::Error;

/// The top-level error type: the one enum a caller of the repository
/// facade actually matches on. Every component crate's own error
/// composes into this one transparently via `#[from]`.
#[derive(Error, Debug)]
pub enum RiftCacheError {
    #[error(transparent)]
    Core(#[from] riftcache_core::CoreError),

    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),

    #[error(transparent)]
    State(#[from] riftcache_state::StateError),

    #[error(transparent)]
    Store(#[from] riftcache_store::StoreError),

    #[error(transparent)]
    Link(#[from] riftcache_link::LinkError),

    #[error(transparent)]
    Ignore(#[from] riftcache_ignore::IgnoreError),

    #[error(transparent)]
    Hash(#[from] riftcache_hash::HashError),

    #[error(transparent)]
    Checkout(#[from] riftcache_checkout::CheckoutError),

    #[error(transparent)]
    Config(#[from] riftcache_config::ConfigError),

    /// §5/§7: the process lock could not be acquired within the
    /// configured timeout. Another process holds it.
    #[error("repository is locked by another process (timed out after {0:?})")]
    Busy(std::time::Duration),

    /// §4.10: the store enumeration that garbage collection's live-set
    /// diff depends on did not complete. Raised before any deletion
    /// begins — GC never deletes based on a partial listing.
    #[error("object store enumeration did not complete, aborting before any deletion: {0}")]
    IncompleteEnumeration(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RiftCacheError>;
