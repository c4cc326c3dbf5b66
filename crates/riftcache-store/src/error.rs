use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("object not found: {digest}")]
    NotFound { digest: String },

    #[error("failed to serialize tree manifest: {0}")]
    TreeSerialize(#[from] serde_json::Error),

    /// §4.5's `load_tree`: the manifest parsed as JSON but an entry
    /// failed validation (non-hex digest, empty algorithm, a relpath
    /// outside POSIX form or containing `..`).
    #[error("directory manifest is corrupt: {0}")]
    CorruptTree(String),

    #[error(transparent)]
    Core(#[from] riftcache_core::CoreError),

    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
