use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),

    #[error(transparent)]
    State(#[from] riftcache_state::StateError),

    #[error(transparent)]
    Store(#[from] riftcache_store::StoreError),

    #[error(transparent)]
    Ignore(#[from] riftcache_ignore::IgnoreError),

    #[error(transparent)]
    Core(#[from] riftcache_core::CoreError),

    /// §4.4: an ignore-file marker was found inside a tracked
    /// directory. Such a file must never be part of a collected
    /// directory because its presence would silently change future
    /// walks of the same tree.
    #[error("ignore-file marker found inside tracked directory: {0}")]
    IgnoreFileInCollectedDir(PathBuf),
}

pub type Result<T> = std::result::Result<T, HashError>;
