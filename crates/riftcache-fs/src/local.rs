use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::error::{FsError, Result};
use crate::{FileSystem, OpenMode, Stat, WalkEntry};

/// The only [`FileSystem`] implementation the core ships: plain
/// local-disk operations via `std::fs` and a handful of `nix`/
/// `reflink-copy` calls for the link variants standard library
/// doesn't expose.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }

    fn meta(&self, path: &Path) -> Result<fs::Metadata> {
        fs::symlink_metadata(path).map_err(|e| FsError::io(path, e))
    }
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn isfile(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }

    fn isdir(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn iscopy(&self, path: &Path) -> Result<bool> {
        let m = self.meta(path)?;
        Ok(!m.file_type().is_symlink() && m.nlink() == 1)
    }

    fn walk(&self, top: &Path, visit: &mut dyn FnMut(&mut WalkEntry) -> Result<()>) -> Result<()> {
        walk_recursive(top, visit)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> Result<File> {
        let mut opts = OpenOptions::new();
        match mode {
            OpenMode::Read => {
                opts.read(true);
            }
            OpenMode::Write => {
                opts.write(true).create(true).truncate(true);
            }
            OpenMode::Append => {
                opts.append(true).create(true);
            }
        }
        opts.open(path).map_err(|e| FsError::io(path, e))
    }

    fn makedirs(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| FsError::io(path, e))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match self.meta(path) {
            Err(FsError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
            Ok(m) => {
                let result = if m.is_dir() {
                    fs::remove_dir_all(path)
                } else {
                    fs::remove_file(path)
                };
                match result {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(FsError::io(path, e)),
                }
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            self.makedirs(parent)?;
        }
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
                self.copy(from, to)?;
                self.remove(from)
            }
            Err(e) => Err(FsError::io(from, e)),
        }
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            self.makedirs(parent)?;
        }
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| FsError::io(from, e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if let Some(parent) = link.parent() {
            self.makedirs(parent)?;
        }
        std::os::unix::fs::symlink(target, link).map_err(|e| FsError::io(link, e))
    }

    fn hardlink(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            self.makedirs(parent)?;
        }
        // Zero-byte degradation (§4.2): a hardlink of an empty file
        // becomes a fresh empty file, since every empty file shares
        // one digest and filesystems cap hardlinks per inode.
        if self.getsize(src)? == 0 {
            File::create(dst).map_err(|e| FsError::io(dst, e))?;
            return Ok(());
        }
        fs::hard_link(src, dst).map_err(|e| FsError::io(dst, e))
    }

    fn reflink(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            self.makedirs(parent)?;
        }
        reflink_copy::reflink(src, dst).map_err(|e| FsError::io(dst, e))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn is_hardlink(&self, path: &Path) -> Result<bool> {
        let m = self.meta(path)?;
        Ok(!m.file_type().is_symlink() && m.nlink() > 1)
    }

    fn getsize(&self, path: &Path) -> Result<u64> {
        self.meta(path).map(|m| m.len())
    }

    fn stat(&self, path: &Path) -> Result<Stat> {
        let m = self.meta(path)?;
        Ok(Stat {
            inode: m.ino(),
            mtime_ns: m.mtime() as i128 * 1_000_000_000 + m.mtime_nsec() as i128,
            size: m.len(),
            nlink: m.nlink(),
            mode: m.mode(),
        })
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| FsError::io(path, e))
    }

    fn set_exec(&self, path: &Path, exec: bool) -> Result<()> {
        let m = self.meta(path)?;
        let mut mode = m.permissions().mode();
        if exec {
            mode |= 0o111;
        } else {
            mode &= !0o111;
        }
        self.chmod(path, mode)
    }
}

fn walk_recursive(dir: &Path, visit: &mut dyn FnMut(&mut WalkEntry) -> Result<()>) -> Result<()> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FsError::NotFound(dir.to_path_buf())),
        Err(e) => return Err(FsError::io(dir, e)),
    };
    for entry in read_dir {
        let entry = entry.map_err(|e| FsError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().map_err(|e| FsError::io(dir, e))?;
        if file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir()) {
            subdirs.push(name);
        } else {
            files.push(name);
        }
    }
    subdirs.sort();
    files.sort();

    let mut entry = WalkEntry {
        dir: dir.to_path_buf(),
        subdirs,
        files,
    };
    visit(&mut entry)?;

    for sub in &entry.subdirs {
        walk_recursive(&entry.dir.join(sub), visit)?;
    }
    Ok(())
}
