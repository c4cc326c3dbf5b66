use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("no configured link type could materialize {0:?}")]
    Exhausted(PathBuf),

    #[error("{0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
