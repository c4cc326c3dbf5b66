//! The change detector (§4.9, C9): is a working-tree path still what
//! its recorded [`HashInfo`] says it should be.

use std::path::Path;

use riftcache_core::HashInfo;
use riftcache_fs::FileSystem;
use riftcache_hash::{hash_dir, hash_file};
use riftcache_ignore::IgnoreFilter;
use riftcache_state::StateCache;
use riftcache_store::ObjectStore;

use crate::error::Result;

/// Recompute the current [`HashInfo`] of `path` through the hashing
/// pipeline (which itself consults the state cache on a hit).
pub fn current_hash(
    fs: &dyn FileSystem,
    state: &StateCache,
    store: &ObjectStore,
    ignore: &IgnoreFilter,
    path: &Path,
    is_dir: bool,
    jobs: usize,
) -> Result<HashInfo> {
    if is_dir {
        Ok(hash_dir(fs, state, store, ignore, path, jobs)?)
    } else {
        Ok(hash_file(fs, state, path)?)
    }
}

/// §4.9's four-step change test: missing path, lost/corrupt cached
/// object, or a recomputed hash mismatch all count as "changed";
/// anything else is unchanged.
#[allow(clippy::too_many_arguments)]
pub fn changed(
    fs: &dyn FileSystem,
    state: &StateCache,
    store: &ObjectStore,
    ignore: &IgnoreFilter,
    path: &Path,
    recorded: &HashInfo,
    is_dir: bool,
    jobs: usize,
) -> Result<bool> {
    if !fs.exists(path) {
        return Ok(true);
    }
    // A verify failure (corrupt bytes, or the object already gone)
    // counts as "changed" rather than propagating: the object being
    // missing is exactly the case this check exists to catch.
    let verified = match store.verify(recorded.file_digest()) {
        Ok(ok) => ok,
        Err(riftcache_store::StoreError::NotFound { .. }) => false,
        Err(e) => return Err(e.into()),
    };
    if !verified {
        return Ok(true);
    }
    let current = current_hash(fs, state, store, ignore, path, is_dir, jobs)?;
    Ok(&current != recorded)
}
