//! # riftcache-hash
//!
//! The hashing pipeline (§4.4): turns a working-tree path into a
//! [`HashInfo`], consulting the state cache to skip unchanged files
//! and writing a directory's canonical manifest through the object
//! store. Per-file hashing inside a directory runs on a bounded,
//! scoped worker pool; the pool never outlives a single call.

mod error;

pub use error::{HashError, Result};

use std::io::Read;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rayon::{ThreadPool, ThreadPoolBuilder};

use riftcache_config::log_hash_debug;
use riftcache_core::{HashInfo, RelPath};
use riftcache_fs::{FileSystem, OpenMode};
use riftcache_ignore::{IgnoreFilter, IGNORE_FILE_NAME};
use riftcache_state::{mtime_and_size, stat_identity, FileIdentity, StateCache};
use riftcache_store::{ObjectStore, TreeEntry};

/// The only algorithm the core speaks, matched by `riftcache-store`'s
/// hardcoded `Md5`.
pub const ALGORITHM: &str = "md5";

/// `min(4, cpu_count/2)`, at least 1 — re-exported so callers that
/// don't want to thread a `riftcache-config::Config` through still
/// get the default worker count.
pub fn default_jobs() -> usize {
    riftcache_config::default_checksum_jobs()
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HashError::NotFound(path.to_path_buf())
        } else {
            riftcache_fs::FsError::io(path, e).into()
        }
    })
}

/// POSIX-form relative path string for a descendant of `root`,
/// rejecting nothing here — validation happens in [`RelPath::parse`].
fn posix_relative(root: &Path, descendant: &Path) -> String {
    let rel = descendant.strip_prefix(root).unwrap_or(descendant);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Hash a single file (§4.4): a state-cache hit skips rehashing
/// entirely; a miss streams the file through MD5 and records the
/// result. Symlinks to files are followed by resolving the path
/// first, so both the cached identity and the bytes read are the
/// target's; a broken symlink surfaces as [`HashError::NotFound`].
pub fn hash_file(fs: &dyn FileSystem, state: &StateCache, path: &Path) -> Result<HashInfo> {
    let resolved = canonicalize(path)?;
    let identity = stat_identity(fs, &resolved)?;

    if let Some(hash) = state.get(&identity)? {
        if !hash.is_dir() {
            log_hash_debug!("state cache hit", path = %resolved.display());
            return Ok(hash);
        }
    }

    let digest = hash_file_bytes(fs, &resolved)?;
    let hash = HashInfo::new(ALGORITHM, digest)?.with_size(identity.size);
    state.save(&identity, &hash)?;
    Ok(hash)
}

fn hash_file_bytes(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut file = fs.open(path, OpenMode::Read)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| riftcache_fs::FsError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn build_pool(jobs: usize) -> ThreadPool {
    ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("riftcache-hash-{i}"))
        .build()
        .expect("failed to build checksum worker pool")
}

/// Hash a directory (§4.4): walk `path` pruned by `ignore`, hash every
/// file (in parallel, on a pool scoped to this call), serialize the
/// sorted `{relpath, hash}` list as a `TreeObject` through `store`,
/// and return the resulting directory [`HashInfo`]. A state-cache hit
/// on the directory's own aggregate identity
/// ([`mtime_and_size`]) short-circuits the whole walk.
pub fn hash_dir(
    fs: &dyn FileSystem,
    state: &StateCache,
    store: &ObjectStore,
    ignore: &IgnoreFilter,
    path: &Path,
    jobs: usize,
) -> Result<HashInfo> {
    let resolved = canonicalize(path)?;
    let dir_files = ignore.walk_files(fs, &resolved)?;

    for file in &dir_files {
        if file.file_name().map(|n| n == IGNORE_FILE_NAME).unwrap_or(false) {
            let parent = file.parent().unwrap_or(&resolved).to_path_buf();
            return Err(HashError::IgnoreFileInCollectedDir(parent));
        }
    }

    let (mtime_ns, size) = mtime_and_size(fs, &resolved, &dir_files)?;
    let dir_stat = fs.stat(&resolved)?;
    let identity = FileIdentity {
        inode: dir_stat.inode,
        mtime_ns,
        size,
    };

    if let Some(cached) = state.get(&identity)? {
        if cached.is_dir() {
            log_hash_debug!("directory state cache hit", path = %resolved.display());
            return Ok(cached);
        }
    }

    let pool = build_pool(jobs);
    let entries: Result<Vec<TreeEntry>> = pool.install(|| {
        use rayon::prelude::*;
        dir_files
            .par_iter()
            .map(|file_path| {
                let relpath = RelPath::parse(&posix_relative(&resolved, file_path))?;
                let hash = hash_file(fs, state, file_path)?;
                Ok(TreeEntry { relpath, hash })
            })
            .collect()
    });
    let mut entries = entries?;

    let dir_hash = store.store_tree(&mut entries)?;
    state.save(&identity, &dir_hash)?;
    Ok(dir_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftcache_config::CacheConfig;
    use riftcache_fs::LocalFs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalFs, StateCache, ObjectStore, IgnoreFilter) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("work")).unwrap();
        std::fs::create_dir_all(tmp.path().join("store")).unwrap();
        let fs = LocalFs;
        let state = StateCache::open(&tmp.path().join("state.sqlite")).unwrap();
        let store = ObjectStore::new(tmp.path().join("store"), true).unwrap();
        let ignore = IgnoreFilter::build(&fs, &tmp.path().join("work")).unwrap();
        let _ = CacheConfig::default();
        (tmp, fs, state, store, ignore)
    }

    #[test]
    fn hash_file_matches_known_md5() {
        let (tmp, fs, state, _store, _ignore) = setup();
        let file = tmp.path().join("work/foo");
        std::fs::write(&file, b"foo").unwrap();
        let hash = hash_file(&fs, &state, &file).unwrap();
        assert_eq!(hash.digest, "acbd18db4cc2f85cedef654fccc4a4d8");
    }

    #[test]
    fn hash_file_second_call_hits_state_cache() {
        let (tmp, fs, state, _store, _ignore) = setup();
        let file = tmp.path().join("work/foo");
        std::fs::write(&file, b"foo").unwrap();
        let first = hash_file(&fs, &state, &file).unwrap();
        let second = hash_file(&fs, &state, &file).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hash_file_of_empty_file_is_canonical_empty_digest() {
        let (tmp, fs, state, _store, _ignore) = setup();
        let file = tmp.path().join("work/empty");
        std::fs::write(&file, b"").unwrap();
        let hash = hash_file(&fs, &state, &file).unwrap();
        assert_eq!(hash.digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn hash_file_of_broken_symlink_is_not_found() {
        let (tmp, fs, state, _store, _ignore) = setup();
        let link = tmp.path().join("work/broken");
        std::os::unix::fs::symlink(tmp.path().join("work/nope"), &link).unwrap();
        let err = hash_file(&fs, &state, &link).unwrap_err();
        assert!(matches!(err, HashError::NotFound(_)));
    }

    #[test]
    fn hash_file_follows_symlink_to_target_bytes() {
        let (tmp, fs, state, _store, _ignore) = setup();
        let target = tmp.path().join("work/real");
        std::fs::write(&target, b"foo").unwrap();
        let link = tmp.path().join("work/link");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let via_link = hash_file(&fs, &state, &link).unwrap();
        let via_target = hash_file(&fs, &state, &target).unwrap();
        assert_eq!(via_link, via_target);
    }

    #[test]
    fn hash_dir_is_order_independent_canonicalization() {
        let (tmp, fs, state, store, ignore) = setup();
        std::fs::write(tmp.path().join("work/b"), b"B").unwrap();
        std::fs::write(tmp.path().join("work/a"), b"A").unwrap();
        let hash = hash_dir(&fs, &state, &store, &ignore, &tmp.path().join("work"), 2).unwrap();
        assert!(hash.is_dir());
        assert_eq!(hash.entry_count, Some(2));

        let entries = store.load_tree(&hash).unwrap();
        assert_eq!(entries[0].relpath.to_string(), "a");
        assert_eq!(entries[1].relpath.to_string(), "b");
    }

    #[test]
    fn hash_dir_of_empty_directory_has_well_defined_digest() {
        let (tmp, fs, state, store, ignore) = setup();
        let hash = hash_dir(&fs, &state, &store, &ignore, &tmp.path().join("work"), 1).unwrap();
        assert!(hash.is_dir());
        assert_eq!(hash.entry_count, Some(0));
    }

    #[test]
    fn hash_dir_rejects_ignore_file_marker_inside_tree() {
        let (tmp, fs, state, store, _ignore) = setup();
        std::fs::write(tmp.path().join("work/.riftignore"), b"\n").unwrap();
        let ignore = IgnoreFilter::empty(&tmp.path().join("work"));
        let err = hash_dir(&fs, &state, &store, &ignore, &tmp.path().join("work"), 1).unwrap_err();
        assert!(matches!(err, HashError::IgnoreFileInCollectedDir(_)));
    }

    #[test]
    fn hash_dir_second_call_hits_directory_state_cache() {
        let (tmp, fs, state, store, ignore) = setup();
        std::fs::write(tmp.path().join("work/a"), b"A").unwrap();
        let first = hash_dir(&fs, &state, &store, &ignore, &tmp.path().join("work"), 1).unwrap();
        let second = hash_dir(&fs, &state, &store, &ignore, &tmp.path().join("work"), 1).unwrap();
        assert_eq!(first, second);
    }
}
