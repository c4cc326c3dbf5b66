//! The repository handle: bundles the object store, state cache, link
//! policy and ignore filter behind a loaded [`Config`], giving a
//! caller one entry point per subsystem. No global mutable state — a
//! caller constructs one per operation, or keeps it alive across many.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use riftcache_checkout::{AlwaysConfirm, CheckoutCtx, CheckoutReport, NeverConfirm, Output};
use riftcache_config::Config;
use riftcache_core::HashInfo;
use riftcache_fs::{FileSystem, LocalFs};
use riftcache_hash::{hash_dir, hash_file};
use riftcache_ignore::IgnoreFilter;
use riftcache_link::LinkPolicy;
use riftcache_state::StateCache;
use riftcache_store::ObjectStore;

use crate::error::Result;
use crate::gc::{self, GcReport};
use crate::lock::RepoLock;

/// One working tree plus the persistent state needed to version it:
/// the four core subsystems (C3, C5, C6, C7) and the config they were
/// built from.
pub struct Repository {
    root: PathBuf,
    config: Config,
    fs: LocalFs,
    state: StateCache,
    store: ObjectStore,
    ignore: IgnoreFilter,
    link: LinkPolicy,
}

impl Repository {
    /// Open (or initialize) a repository rooted at `root`: loads
    /// `<root>/.riftcache/config.toml` (or compiled-in defaults),
    /// opens the state cache, creates the object store directory if
    /// absent, and builds the ignore filter by walking `root` once.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = Config::load_for_project(&root)?;
        let fs = LocalFs::new();

        let meta_dir = root.join(riftcache_config::META_DIR);
        fs.makedirs(&meta_dir)?;

        let state = StateCache::open_with_limits(
            &meta_dir.join("state.sqlite"),
            config.state.row_limit,
            config.state.row_cleanup_quota,
        )?;
        let store_root = if config.cache.dir.is_absolute() {
            config.cache.dir.clone()
        } else {
            root.join(&config.cache.dir)
        };
        let store = ObjectStore::new(store_root, config.cache.protected)?;
        let ignore = IgnoreFilter::build(&fs, &root)?;
        let link = LinkPolicy::new(config.cache.link_type.clone());

        Ok(Self {
            root,
            config,
            fs,
            state,
            store,
            ignore,
            link,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn state(&self) -> &StateCache {
        &self.state
    }

    fn lock_path(&self) -> PathBuf {
        RepoLock::path_for_store_root(self.store.root())
    }

    /// §4.4 + §4.5: hash `path` (file or directory, auto-detected) and
    /// adopt its bytes into the object store under the resulting
    /// digest, holding the process lock for the duration of the write
    /// (§5's "Writers... MUST hold the lock"). Returns the resulting
    /// [`HashInfo`]; the source path is left untouched — only a copy
    /// of its bytes is moved into the store (the working-tree copy is
    /// the caller's, C5's `put` adopts a *temporary* staged copy, not
    /// the live working file).
    pub fn add(&self, path: &Path) -> Result<HashInfo> {
        let _lock = RepoLock::acquire(&self.lock_path(), None)?;
        let jobs = self.config.core.checksum_jobs;

        if self.fs.isdir(path) {
            let hash = hash_dir(&self.fs, &self.state, &self.store, &self.ignore, path, jobs)?;
            Ok(hash)
        } else {
            let hash = hash_file(&self.fs, &self.state, path)?;
            if !self.store.exists(hash.file_digest()) {
                let bytes = std::fs::read(path).map_err(|source| crate::error::RiftCacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                self.store.put_bytes(hash.file_digest(), &bytes)?;
            }
            Ok(hash)
        }
    }

    /// §4.8/§4.9: does `path` (recorded as `hash`) still match what's
    /// on disk?
    pub fn changed(&self, path: &Path, hash: &HashInfo, is_dir: bool) -> Result<bool> {
        let jobs = self.config.core.checksum_jobs;
        Ok(riftcache_checkout::changed(
            &self.fs, &self.state, &self.store, &self.ignore, path, hash, is_dir, jobs,
        )?)
    }

    /// §4.8: materialize every output into the working tree,
    /// collecting failures rather than aborting at the first one.
    /// Holds the process lock for the duration of the run (§5).
    /// `force` skips the confirm-before-removing-unbacked-content
    /// check; when `false`, removal of anything not store-backed nor
    /// matching its recorded hash is declined outright (library
    /// callers that want interactive confirmation should check
    /// [`Self::changed`] themselves up front and call with `force`).
    pub fn checkout(&mut self, outputs: &[Output], force: bool, relink: bool) -> Result<CheckoutReport> {
        let _lock = RepoLock::acquire(&self.lock_path(), None)?;
        let jobs = self.config.core.checksum_jobs;
        let confirm: &dyn riftcache_checkout::ConfirmRemove = if force { &AlwaysConfirm } else { &NeverConfirm };
        let mut ctx = CheckoutCtx {
            fs: &self.fs,
            state: &self.state,
            store: &self.store,
            ignore: &self.ignore,
            link: &mut self.link,
            confirm,
            jobs,
        };
        Ok(riftcache_checkout::checkout_outputs(&mut ctx, outputs, force, relink, None)?)
    }

    /// §4.3's `remove_unused_links`: reclaim any materialized link the
    /// caller's current set of stage outputs (`live_paths`) no longer
    /// references. A link whose on-disk identity still matches what
    /// was recorded when it was materialized is deleted outright;
    /// one the user has since edited in place is left alone and only
    /// its bookkeeping row is dropped, since that path is no longer
    /// this repository's to manage.
    pub fn reconcile_links(&self, live_paths: &HashSet<PathBuf>) -> Result<()> {
        self.state.remove_unused_links(live_paths, &self.fs)?;
        Ok(())
    }

    /// §4.10: collect every object not named by `live`, holding the
    /// process lock across the whole sweep so nothing in `live` can
    /// change underneath it mid-run (§5's GC safety requirement).
    pub fn gc(&self, live: &HashSet<HashInfo>) -> Result<GcReport> {
        let lock = RepoLock::acquire(&self.lock_path(), None)?;
        gc::collect(&lock, &self.store, live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_then_checkout_round_trips_a_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let src = root.join("input.txt");
        std::fs::write(&src, b"hello repo").unwrap();

        let mut repo = Repository::open(&root).unwrap();
        let hash = repo.add(&src).unwrap();
        assert!(repo.store().exists(hash.file_digest()));

        let out = root.join("output.txt");
        let outputs = vec![Output {
            path: out.clone(),
            hash: Some(hash),
            is_dir: false,
        }];
        let report = repo.checkout(&outputs, false, false).unwrap();
        assert_eq!(report.updated, vec![out.clone()]);
        assert_eq!(std::fs::read(&out).unwrap(), b"hello repo");
    }

    #[test]
    fn reconcile_links_drops_an_output_no_longer_named_by_any_stage() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let src = root.join("src.txt");
        std::fs::write(&src, b"payload").unwrap();

        let mut repo = Repository::open(&root).unwrap();
        let hash = repo.add(&src).unwrap();
        let out = root.join("out.txt");
        repo.checkout(
            &[Output {
                path: out.clone(),
                hash: Some(hash),
                is_dir: false,
            }],
            false,
            false,
        )
        .unwrap();
        assert!(out.exists());

        // No stage references `out` anymore.
        repo.reconcile_links(&HashSet::new()).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn add_is_idempotent_and_skips_rewriting_store() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let src = root.join("a.txt");
        std::fs::write(&src, b"same bytes").unwrap();

        let repo = Repository::open(&root).unwrap();
        let first = repo.add(&src).unwrap();
        let second = repo.add(&src).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn gc_keeps_only_live_objects() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir_all(&root).unwrap();
        let keep_src = root.join("keep.txt");
        std::fs::write(&keep_src, b"keep me").unwrap();
        let drop_src = root.join("drop.txt");
        std::fs::write(&drop_src, b"drop me").unwrap();

        let repo = Repository::open(&root).unwrap();
        let keep_hash = repo.add(&keep_src).unwrap();
        let drop_hash = repo.add(&drop_src).unwrap();

        let mut live = HashSet::new();
        live.insert(keep_hash.clone());
        let report = repo.gc(&live).unwrap();

        assert_eq!(report.removed, vec![drop_hash.digest]);
        assert!(repo.store().exists(keep_hash.file_digest()));
    }
}
