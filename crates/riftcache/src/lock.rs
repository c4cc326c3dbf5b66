//! The inter-process lock: an advisory `flock` over a single file at
//! `store_root/../lock`, held for the duration of any operation that
//! writes to the shared object store or state cache. A bounded retry
//! loop over `fs2::FileExt::try_lock_exclusive` rather than a blocking
//! wait, so a caller gets a `Busy` error instead of hanging forever
//! behind a stuck holder.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Result, RiftCacheError};

const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;
const RETRY_SLEEP: Duration = Duration::from_millis(100);

/// An acquired exclusive lock. Released on drop — there is no
/// explicit `unlock`; closing the underlying file releases the flock.
pub struct RepoLock {
    file: File,
}

impl RepoLock {
    /// Acquire the lock at `lock_path`, retrying on `WouldBlock` until
    /// `timeout` elapses, then failing `Busy` (§5's "Cancellation and
    /// timeouts"). `RIFTCACHE_LOCK_TIMEOUT` (seconds) overrides the
    /// default when `timeout` isn't given explicitly.
    pub fn acquire(lock_path: &Path, timeout: Option<Duration>) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| RiftCacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(lock_path).map_err(|source| RiftCacheError::Io {
            path: lock_path.to_path_buf(),
            source,
        })?;

        let timeout = timeout.unwrap_or_else(default_timeout);
        let start = Instant::now();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        return Err(RiftCacheError::Busy(timeout));
                    }
                    std::thread::sleep(RETRY_SLEEP);
                }
                Err(e) => {
                    return Err(RiftCacheError::Io {
                        path: lock_path.to_path_buf(),
                        source: e,
                    })
                }
            }
        }
    }

    /// The conventional lock path for a repository root: a sibling of
    /// the object store directory, not inside it, so GC (which needs
    /// to enumerate the store root itself) never trips over it.
    pub fn path_for_store_root(store_root: &Path) -> PathBuf {
        store_root
            .parent()
            .map(|p| p.join("lock"))
            .unwrap_or_else(|| store_root.join("lock"))
    }
}

fn default_timeout() -> Duration {
    let secs = std::env::var("RIFTCACHE_LOCK_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS);
    Duration::from_secs(secs)
}
