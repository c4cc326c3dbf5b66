//! The checkout engine (§4.8, C8): materialize stage outputs into the
//! working tree, reconciling whatever is already on disk against the
//! recorded [`HashInfo`] and collecting per-output failures into one
//! aggregate error at the end.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use riftcache_config::{log_checkout_debug, log_checkout_info, log_checkout_warn};
use riftcache_core::HashInfo;
use riftcache_fs::FileSystem;
use riftcache_ignore::IgnoreFilter;
use riftcache_link::LinkPolicy;
use riftcache_state::{stat_identity, StateCache};
use riftcache_store::ObjectStore;

use crate::change::changed;
use crate::error::{CheckoutError, Result};

/// One stage output as the core sees it (§3's `StageRecord`, the
/// subset the checkout engine needs): a working-tree path, its
/// recorded hash (absent means "this output was never cached"), and
/// whether it's a directory.
#[derive(Debug, Clone)]
pub struct Output {
    pub path: PathBuf,
    pub hash: Option<HashInfo>,
    pub is_dir: bool,
}

/// Confirms (or declines) removing a path that isn't safely backed by
/// the object store (§4.8's injected prompt).
pub trait ConfirmRemove {
    fn confirm(&self, path: &Path) -> bool;
}

/// Always declines: the conservative default for non-interactive
/// callers (batch jobs, tests) that would rather fail loudly than
/// silently destroy unbacked data.
pub struct NeverConfirm;
impl ConfirmRemove for NeverConfirm {
    fn confirm(&self, _path: &Path) -> bool {
        false
    }
}

/// Always confirms — equivalent to running with `force` for the
/// specific case `remove_safely` would otherwise have prompted on.
pub struct AlwaysConfirm;
impl ConfirmRemove for AlwaysConfirm {
    fn confirm(&self, _path: &Path) -> bool {
        true
    }
}

/// Per-output outcome, returned only for bookkeeping inside a single
/// run; the aggregate [`CheckoutError::Failed`] is what a caller
/// ultimately sees if anything failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unchanged,
    Updated,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct CheckoutReport {
    pub unchanged: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// The value bundle every checkout operation threads through: the
/// filesystem adapter, the three persistent stores, the mutable link
/// policy (its `confirmed` bit is meant to survive across a whole
/// run, §4.6), and the confirmation sink for unsafe removals.
pub struct CheckoutCtx<'a> {
    pub fs: &'a dyn FileSystem,
    pub state: &'a StateCache,
    pub store: &'a ObjectStore,
    pub ignore: &'a IgnoreFilter,
    pub link: &'a mut LinkPolicy,
    pub confirm: &'a dyn ConfirmRemove,
    pub jobs: usize,
}

impl CheckoutCtx<'_> {
    fn changed(&self, path: &Path, recorded: &HashInfo, is_dir: bool) -> Result<bool> {
        changed(
            self.fs, self.state, self.store, self.ignore, path, recorded, is_dir, self.jobs,
        )
    }

    fn current_hash(&self, path: &Path, is_dir: bool) -> Result<HashInfo> {
        crate::change::current_hash(self.fs, self.state, self.store, self.ignore, path, is_dir, self.jobs)
    }
}

/// §4.8: remove `path` unconditionally under `force`; otherwise, only
/// remove without asking if the path's current content is already
/// backed by the store (somewhere) or matches `recorded` — i.e.
/// deleting it loses nothing `riftcache` itself couldn't reproduce.
/// Otherwise defer to [`CheckoutCtx::confirm`].
fn remove_safely(ctx: &CheckoutCtx, path: &Path, recorded: Option<&HashInfo>, force: bool) -> Result<()> {
    if force || !ctx.fs.exists(path) {
        ctx.fs.remove(path)?;
        return Ok(());
    }

    let is_dir = ctx.fs.isdir(path);
    let current = ctx.current_hash(path, is_dir)?;
    let backed_by_store = ctx.store.exists(current.file_digest());
    let matches_recorded = recorded.is_some_and(|r| r == &current);

    if backed_by_store || matches_recorded {
        ctx.fs.remove(path)?;
        return Ok(());
    }

    if ctx.confirm.confirm(path) {
        ctx.fs.remove(path)?;
        Ok(())
    } else {
        Err(CheckoutError::ConfirmRemoveError(path.to_path_buf()))
    }
}

fn record_materialization(ctx: &CheckoutCtx, path: &Path, hash: &HashInfo) -> Result<()> {
    let identity = stat_identity(ctx.fs, path)?;
    ctx.state.save(&identity, hash)?;
    Ok(())
}

/// §4.8's `checkout_file`: the four-branch state machine for a single
/// file path (absent / changed / unchanged-but-wrong-link-type /
/// unchanged-and-fine).
fn checkout_file(ctx: &mut CheckoutCtx, path: &Path, hash: &HashInfo, force: bool) -> Result<()> {
    let object_path = ctx.store.object_path(hash.file_digest());

    if !ctx.fs.exists(path) {
        ctx.link.materialize(ctx.fs, &object_path, path)?;
        record_materialization(ctx, path, hash)?;
        log_checkout_debug!("materialized new file", path = %path.display());
        return Ok(());
    }

    if ctx.changed(path, hash, false)? {
        remove_safely(ctx, path, Some(hash), force)?;
        ctx.link.materialize(ctx.fs, &object_path, path)?;
        record_materialization(ctx, path, hash)?;
        log_checkout_debug!("replaced changed file", path = %path.display());
        return Ok(());
    }

    if ctx.link.active() == Some(riftcache_core::LinkKind::Copy) && ctx.fs.iscopy(path)? {
        // Content already matches and is an independent copy: avoid a
        // wasted remove+rewrite, just make sure it's writable.
        riftcache_link::unprotect(ctx.fs, path)?;
        return Ok(());
    }

    ctx.fs.remove(path)?;
    ctx.link.materialize(ctx.fs, &object_path, path)?;
    record_materialization(ctx, path, hash)?;
    Ok(())
}

/// §4.8's `checkout_directory`: materialize every tree entry, then
/// remove whatever working-tree file isn't one of them.
fn checkout_directory(ctx: &mut CheckoutCtx, path: &Path, hash: &HashInfo, force: bool) -> Result<()> {
    if !ctx.fs.exists(path) {
        ctx.fs.makedirs(path)?;
    }

    let entries = ctx.store.load_tree(hash)?;
    let mut needed = HashSet::new();
    for entry in &entries {
        let entry_path = path.join(entry.relpath.to_path_buf());
        needed.insert(entry_path.clone());
        checkout_file(ctx, &entry_path, &entry.hash, force)?;
    }

    let existing = ctx.fs.walk_files(path)?;
    for file in existing {
        if !needed.contains(&file) {
            remove_safely(ctx, &file, None, force)?;
        }
    }
    Ok(())
}

fn dir_has_missing_entry(ctx: &CheckoutCtx, hash: &HashInfo) -> Result<bool> {
    let entries = ctx.store.load_tree(hash)?;
    Ok(entries.iter().any(|e| !ctx.store.exists(e.hash.file_digest())))
}

/// One output, start to finish (§4.8's per-output algorithm).
fn checkout_output(ctx: &mut CheckoutCtx, output: &Output, force: bool, relink: bool) -> Result<Status> {
    let Some(hash) = output.hash.as_ref() else {
        if ctx.fs.exists(&output.path) {
            remove_safely(ctx, &output.path, None, force)?;
        }
        return Ok(Status::Failed);
    };

    if !relink && !ctx.changed(&output.path, hash, output.is_dir)? {
        return Ok(Status::Unchanged);
    }

    let object_missing = !ctx.store.exists(hash.file_digest());
    let dir_incomplete = !object_missing && output.is_dir && dir_has_missing_entry(ctx, hash)?;
    if object_missing || dir_incomplete {
        log_checkout_warn!("object missing from store", path = %output.path.display());
        remove_safely(ctx, &output.path, Some(hash), force)?;
        return Ok(Status::Failed);
    }

    if output.is_dir {
        checkout_directory(ctx, &output.path, hash, force)?;
    } else {
        checkout_file(ctx, &output.path, hash, force)?;
    }

    let identity = stat_identity(ctx.fs, &output.path)?;
    ctx.state.update_link(&output.path, &identity)?;
    Ok(Status::Updated)
}

/// Checkout every output, collecting failures instead of aborting at
/// the first one (§4.8's partial-failure contract). `progress` is
/// called once per output with `(path, done, total)`.
pub fn checkout_outputs(
    ctx: &mut CheckoutCtx,
    outputs: &[Output],
    force: bool,
    relink: bool,
    mut progress: Option<&mut dyn FnMut(&Path, usize, usize)>,
) -> Result<CheckoutReport> {
    let total = outputs.len();
    let mut report = CheckoutReport::default();
    let mut failed_paths = Vec::new();

    for (i, output) in outputs.iter().enumerate() {
        if let Some(cb) = progress.as_deref_mut() {
            cb(&output.path, i + 1, total);
        }

        let outcome = checkout_output(ctx, output, force, relink);
        match outcome {
            Ok(Status::Unchanged) => report.unchanged.push(output.path.clone()),
            Ok(Status::Updated) => report.updated.push(output.path.clone()),
            Ok(Status::Failed) => {
                report.failed.push(output.path.clone());
                failed_paths.push(output.path.clone());
            }
            Err(e) => {
                log_checkout_warn!("checkout of output failed", path = %output.path.display(), error = %e);
                report.failed.push(output.path.clone());
                failed_paths.push(output.path.clone());
            }
        }
    }

    if !failed_paths.is_empty() {
        return Err(CheckoutError::Failed(failed_paths));
    }

    log_checkout_info!(
        "checkout complete",
        unchanged = report.unchanged.len(),
        updated = report.updated.len()
    );
    Ok(report)
}
