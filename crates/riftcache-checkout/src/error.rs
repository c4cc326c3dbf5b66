use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),

    #[error(transparent)]
    State(#[from] riftcache_state::StateError),

    #[error(transparent)]
    Store(#[from] riftcache_store::StoreError),

    #[error(transparent)]
    Link(#[from] riftcache_link::LinkError),

    #[error(transparent)]
    Hash(#[from] riftcache_hash::HashError),

    #[error(transparent)]
    Core(#[from] riftcache_core::CoreError),

    /// §4.8: the user declined to remove a path whose content wasn't
    /// safely backed by the object store.
    #[error("refused to remove {0:?} without confirmation")]
    ConfirmRemoveError(PathBuf),

    /// §7's aggregate `CheckoutError`: carries every output path that
    /// failed during one checkout run. Raised once, at the end, so
    /// outputs that succeeded stay materialized.
    #[error("checkout failed for {} output(s): {0:?}", .0.len())]
    Failed(Vec<PathBuf>),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
