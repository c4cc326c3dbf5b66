use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IgnoreError {
    #[error("invalid ignore pattern in {path:?}: {source}")]
    Pattern {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IgnoreError>;
