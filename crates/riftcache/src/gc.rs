//! The garbage collector: diff a full store enumeration against a
//! caller-supplied live set, deleting anything unreferenced. Requires
//! the caller already hold the process lock across both computing the
//! live set and the sweep, and aborts before deleting anything if the
//! enumeration didn't complete.

use std::collections::HashSet;

use riftcache_config::{log_gc_info, log_gc_warn};
use riftcache_core::HashInfo;
use riftcache_store::ObjectStore;

use crate::error::{Result, RiftCacheError};
use crate::lock::RepoLock;

#[derive(Debug, Clone, Default)]
pub struct GcReport {
    pub removed: Vec<String>,
    pub kept: usize,
}

/// Collect every object not named by `live`. Requires the caller to
/// already hold the repository lock (§4.10's "acquires the process
/// lock"): the lock itself is not taken here so a caller computing
/// `live` under the same lock sees a consistent view end to end.
///
/// The full enumeration is collected into memory before any deletion
/// begins; an enumeration failure aborts with
/// [`RiftCacheError::IncompleteEnumeration`] and deletes nothing
/// (§4.10's "never delete on a partial enumeration").
pub fn collect(_lock: &RepoLock, store: &ObjectStore, live: &HashSet<HashInfo>) -> Result<GcReport> {
    let live_digests: HashSet<&str> = live.iter().map(|h| h.file_digest()).collect();

    let digests: std::result::Result<Vec<String>, _> = store.iter()?.collect();
    let digests = digests.map_err(|e| RiftCacheError::IncompleteEnumeration(e.to_string()))?;

    let mut report = GcReport::default();
    for digest in digests {
        if live_digests.contains(digest.as_str()) {
            report.kept += 1;
            continue;
        }
        store.delete(&digest)?;
        log_gc_warn!("removed unreferenced object", digest = %digest);
        report.removed.push(digest);
    }

    log_gc_info!("gc complete", removed = report.removed.len(), kept = report.kept);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcache_core::HashInfo;
    use std::time::Duration;
    use tempfile::TempDir;

    fn put(store: &ObjectStore, bytes: &[u8]) -> HashInfo {
        use md5::{Digest, Md5};
        let digest = hex::encode(Md5::digest(bytes));
        store.put_bytes(&digest, bytes).unwrap();
        HashInfo::new("md5", digest).unwrap()
    }

    #[test]
    fn removes_objects_absent_from_the_live_set() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path().join("store"), false).unwrap();
        let kept = put(&store, b"kept");
        let garbage = put(&store, b"garbage");

        let lock = RepoLock::acquire(&tmp.path().join("lock"), Some(Duration::from_millis(50))).unwrap();
        let mut live = HashSet::new();
        live.insert(kept.clone());

        let report = collect(&lock, &store, &live).unwrap();
        assert_eq!(report.removed, vec![garbage.digest.clone()]);
        assert_eq!(report.kept, 1);
        assert!(store.exists(&kept.digest));
        assert!(!store.exists(&garbage.digest));
    }

    #[test]
    fn empty_live_set_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStore::new(tmp.path().join("store"), false).unwrap();
        put(&store, b"a");
        put(&store, b"b");

        let lock = RepoLock::acquire(&tmp.path().join("lock"), Some(Duration::from_millis(50))).unwrap();
        let report = collect(&lock, &store, &HashSet::new()).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert_eq!(store.iter().unwrap().count(), 0);
    }
}
