use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("sqlite error against {path:?}: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Fs(#[from] riftcache_fs::FsError),

    #[error(transparent)]
    Core(#[from] riftcache_core::CoreError),

    #[error("state database at {0:?} is corrupt")]
    Corrupt(PathBuf),
}

pub type Result<T> = std::result::Result<T, StateError>;
