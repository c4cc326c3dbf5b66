//! # riftcache-fs
//!
//! The filesystem adapter (§4.2): a small capability trait plus the
//! one implementation the core needs, `LocalFs`. Non-local schemes
//! are someone else's problem; this crate only ever touches a local
//! disk.

mod error;
mod local;

pub use error::{FsError, Result};
pub use local::LocalFs;

use std::fs::File;
use std::path::{Path, PathBuf};

/// How to open a file via [`FileSystem::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

/// The subset of `stat(2)` the rest of the system needs to decide
/// whether a path's identity has changed (§3's `StateEntry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inode: u64,
    pub mtime_ns: i128,
    pub size: u64,
    pub nlink: u64,
    pub mode: u32,
}

/// One level of [`FileSystem::walk`]: the directory itself, its
/// immediate subdirectory names (mutable so a caller can prune
/// descent, mirroring `os.walk`'s topdown `dirnames` convention) and
/// its immediate file names.
pub struct WalkEntry {
    pub dir: PathBuf,
    pub subdirs: Vec<String>,
    pub files: Vec<String>,
}

/// Uniform filesystem operations (§4.2). A single capability set
/// rather than a class hierarchy: the local implementation is the
/// only one the core needs, and other transports compose with it at
/// a higher layer instead of implementing this trait.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn isfile(&self, path: &Path) -> bool;
    fn isdir(&self, path: &Path) -> bool;

    /// Is this path an independent file (not a symlink, not one end
    /// of a hardlink pair sharing an inode elsewhere) — i.e. safe to
    /// overwrite in place without disturbing anything else.
    fn iscopy(&self, path: &Path) -> Result<bool>;

    /// Depth-first, topdown walk. `visit` is called once per
    /// directory with its subdirectory and file names; it may remove
    /// entries from `subdirs` to prune that branch before descent
    /// continues (§4.2).
    fn walk(&self, top: &Path, visit: &mut dyn FnMut(&mut WalkEntry) -> Result<()>) -> Result<()>;

    /// Flattened file listing under `top`, built on [`Self::walk`]
    /// with no pruning.
    fn walk_files(&self, top: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.walk(top, &mut |entry| {
            for f in &entry.files {
                out.push(entry.dir.join(f));
            }
            Ok(())
        })?;
        Ok(out)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> Result<File>;
    fn makedirs(&self, path: &Path) -> Result<()>;

    /// Idempotent: a no-op if `path` is already absent (§4.2).
    fn remove(&self, path: &Path) -> Result<()>;

    /// Atomic rename when `from` and `to` share a device; falls back
    /// to copy+remove otherwise. Must never leave both or neither
    /// present (§4.2's atomicity contract).
    fn move_path(&self, from: &Path, to: &Path) -> Result<()>;

    fn copy(&self, from: &Path, to: &Path) -> Result<()>;
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Hardlinks `src` to `dst`. Per §4.2, a zero-byte `src` MUST
    /// degrade to creating a fresh empty file at `dst` rather than an
    /// actual hardlink (many filesystems cap hardlinks per inode, and
    /// every empty file shares one digest).
    fn hardlink(&self, src: &Path, dst: &Path) -> Result<()>;

    fn reflink(&self, src: &Path, dst: &Path) -> Result<()>;
    fn is_symlink(&self, path: &Path) -> bool;
    fn is_hardlink(&self, path: &Path) -> Result<bool>;
    fn getsize(&self, path: &Path) -> Result<u64>;
    fn stat(&self, path: &Path) -> Result<Stat>;
    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
    fn set_exec(&self, path: &Path, exec: bool) -> Result<()>;
}
